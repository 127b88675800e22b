// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! High-resolution dispatch timer backend.
//!
//! [`DispatchTimer`] behaves like a timer source on the main dispatch queue:
//! it is serviced whatever mode the loop runs in, so it needs no extra work
//! for a live resize, and it carries a coalescing leeway so that nearby
//! wake-ups share one sleep.

use cadence_core::backend::{BackendKind, FireCallback, TimerBackend, TimerError};
use cadence_core::time::Period;

use crate::registration::Registration;
use crate::run_loop::{ModeSet, RunLoop, SourceId};

/// A repeating timer with leeway, serviced in every run loop mode.
#[derive(Debug)]
pub struct DispatchTimer {
    registration: Registration,
    leeway: Period,
}

impl DispatchTimer {
    /// Creates an unarmed timer for `run_loop` with the given leeway.
    #[must_use]
    pub fn new(run_loop: &RunLoop, leeway: Period) -> Self {
        Self {
            registration: Registration::new(run_loop),
            leeway,
        }
    }

    /// Returns the coalescing leeway.
    #[must_use]
    pub fn leeway(&self) -> Period {
        self.leeway
    }

    /// Returns the installed source.
    #[must_use]
    pub fn source(&self) -> Option<SourceId> {
        self.registration.source()
    }
}

impl TimerBackend for DispatchTimer {
    fn kind(&self) -> BackendKind {
        BackendKind::HighRes
    }

    fn arm(&mut self, period: Period, on_fire: FireCallback) -> Result<(), TimerError> {
        self.registration
            .install(period, self.leeway, ModeSet::COMMON, on_fire)?;
        Ok(())
    }

    fn cancel(&mut self) {
        self.registration.cancel();
    }

    fn is_valid(&self) -> bool {
        self.registration.is_valid()
    }

    fn installed_period(&self) -> Period {
        self.registration.period()
    }

    fn rearm_for_live_resize(
        &mut self,
        active_period: Period,
        on_fire: FireCallback,
    ) -> Result<(), TimerError> {
        self.arm(active_period, on_fire)
    }
}
