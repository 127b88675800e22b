// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hysteresis for slowing the cadence down.
//!
//! After a burst of output the surface should keep refreshing quickly until
//! at least one more tick has drawn, so progress is visible before the
//! cadence throttles. The [`DeferralGate`] therefore applies speed-ups
//! immediately but holds a slow-down back and records that one is owed. The
//! controller pays the debt on the next fire by re-evaluating with
//! `force = true` before the redraw callback runs.

use crate::time::Period;

/// Decision returned by [`DeferralGate::decide`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GateDecision {
    /// Install the proposed period now.
    Apply,
    /// Keep the installed period until the next fire.
    Defer,
}

impl GateDecision {
    /// Returns `true` for [`GateDecision::Apply`].
    #[inline]
    #[must_use]
    pub const fn applies(self) -> bool {
        matches!(self, Self::Apply)
    }
}

/// Tracks whether a slow-down is owed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeferralGate {
    pending: bool,
}

impl DeferralGate {
    /// Creates a gate with nothing pending.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: false }
    }

    /// Decides whether `proposed` replaces `installed` now.
    ///
    /// - `force` always applies and clears any pending deferral.
    /// - With nothing installed ([`Period::UNSET`]) the proposal applies.
    /// - A longer period than the installed one is deferred and marked
    ///   pending.
    /// - A shorter or equal period applies and clears the pending flag,
    ///   since the installed rate then reflects the current signals.
    pub fn decide(&mut self, proposed: Period, installed: Period, force: bool) -> GateDecision {
        if !force && !installed.is_unset() && proposed > installed {
            self.pending = true;
            return GateDecision::Defer;
        }
        self.pending = false;
        GateDecision::Apply
    }

    /// Boolean form of [`decide`](Self::decide).
    pub fn should_apply_now(&mut self, proposed: Period, installed: Period, force: bool) -> bool {
        self.decide(proposed, installed, force).applies()
    }

    /// Returns `true` if a slow-down is owed.
    #[inline]
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consumes the pending flag, returning whether it was set.
    ///
    /// Called exactly once per fire, before the redraw callback.
    pub fn take_pending(&mut self) -> bool {
        core::mem::take(&mut self.pending)
    }

    /// Drops any pending deferral without resolving it.
    pub fn clear(&mut self) {
        self.pending = false;
    }
}
