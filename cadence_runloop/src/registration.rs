// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The single source a backend owns on a run loop.

use cadence_core::backend::{FireCallback, TimerError};
use cadence_core::time::Period;

use crate::run_loop::{ModeSet, RunLoop, SourceId, TimerSpec, WeakRunLoop};

/// At most one live run loop source, plus the period it repeats at.
#[derive(Debug)]
pub(crate) struct Registration {
    run_loop: WeakRunLoop,
    source: Option<SourceId>,
    period: Period,
}

impl Registration {
    pub(crate) fn new(run_loop: &RunLoop) -> Self {
        Self {
            run_loop: run_loop.downgrade(),
            source: None,
            period: Period::UNSET,
        }
    }

    /// Replaces the installed source with a new one.
    ///
    /// The old source is removed before the new one is added, so two are
    /// never live at once. On error nothing is installed.
    pub(crate) fn install(
        &mut self,
        period: Period,
        leeway: Period,
        modes: ModeSet,
        on_fire: FireCallback,
    ) -> Result<SourceId, TimerError> {
        self.cancel();
        if period.is_unset() {
            return Err(TimerError::InvalidPeriod);
        }
        let run_loop = self.run_loop.upgrade().ok_or(TimerError::LoopUnavailable)?;
        let first_fire = run_loop
            .now()
            .checked_add(period)
            .ok_or(TimerError::InvalidPeriod)?;
        let id = run_loop.add_timer(
            TimerSpec {
                first_fire,
                period,
                leeway,
                modes,
            },
            on_fire,
        );
        self.source = Some(id);
        self.period = period;
        Ok(id)
    }

    /// Removes the installed source. Idempotent.
    pub(crate) fn cancel(&mut self) {
        if let Some(id) = self.source.take()
            && let Some(run_loop) = self.run_loop.upgrade()
        {
            run_loop.remove(id);
        }
        self.period = Period::UNSET;
    }

    /// Adds `modes` to the installed source.
    pub(crate) fn add_modes(&self, modes: ModeSet) -> bool {
        match (self.source, self.run_loop.upgrade()) {
            (Some(id), Some(run_loop)) => run_loop.add_modes(id, modes),
            _ => false,
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        match (self.source, self.run_loop.upgrade()) {
            (Some(id), Some(run_loop)) => run_loop.contains(id),
            _ => false,
        }
    }

    pub(crate) fn period(&self) -> Period {
        if self.is_valid() {
            self.period
        } else {
            Period::UNSET
        }
    }

    pub(crate) fn modes(&self) -> Option<ModeSet> {
        let id = self.source?;
        self.run_loop.upgrade()?.modes(id)
    }

    pub(crate) fn source(&self) -> Option<SourceId> {
        self.source.filter(|_| self.is_valid())
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.cancel();
    }
}
