// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coarse run-loop timer backend.
//!
//! [`RunLoopTimer`] registers its source for [`ModeSet::DEFAULT`] only, with
//! no leeway. That is cheap and precise, but a source bound to the default
//! mode stops firing while a live resize runs its nested loop in
//! [`RunLoopMode::EventTracking`](crate::RunLoopMode::EventTracking). The
//! backend therefore:
//!
//! - adds the installed source to [`ModeSet::EVENT_TRACKING`] in
//!   [`will_start_live_resize`](TimerBackend::will_start_live_resize), and
//! - registers the resize-forced timer for [`ModeSet::COMMON`] in
//!   [`rearm_for_live_resize`](TimerBackend::rearm_for_live_resize).
//!
//! A plain [`arm`](TimerBackend::arm) goes back to the default mode only.

use cadence_core::backend::{BackendKind, FireCallback, TimerBackend, TimerError};
use cadence_core::time::Period;

use crate::registration::Registration;
use crate::run_loop::{ModeSet, RunLoop, SourceId};

/// A repeating timer scheduled on a [`RunLoop`] in the default mode.
#[derive(Debug)]
pub struct RunLoopTimer {
    registration: Registration,
}

impl RunLoopTimer {
    /// Creates an unarmed timer for `run_loop`.
    #[must_use]
    pub fn new(run_loop: &RunLoop) -> Self {
        Self {
            registration: Registration::new(run_loop),
        }
    }

    /// Returns the modes the installed source fires in.
    #[must_use]
    pub fn modes(&self) -> Option<ModeSet> {
        self.registration.modes()
    }

    /// Returns the installed source.
    #[must_use]
    pub fn source(&self) -> Option<SourceId> {
        self.registration.source()
    }
}

impl TimerBackend for RunLoopTimer {
    fn kind(&self) -> BackendKind {
        BackendKind::Coarse
    }

    fn arm(&mut self, period: Period, on_fire: FireCallback) -> Result<(), TimerError> {
        self.registration
            .install(period, Period::UNSET, ModeSet::DEFAULT, on_fire)?;
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

    fn will_start_live_resize(&mut self) {
        self.registration.add_modes(ModeSet::EVENT_TRACKING);
    }

    fn rearm_for_live_resize(
        &mut self,
        active_period: Period,
        on_fire: FireCallback,
    ) -> Result<(), TimerError> {
        self.registration
            .install(active_period, Period::UNSET, ModeSet::COMMON, on_fire)?;
        Ok(())
    }
}
