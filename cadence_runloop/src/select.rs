// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend selection, done once at construction.

use std::rc::{Rc, Weak};

use cadence_core::backend::{BackendKind, FireCallback, TimerBackend, TimerError};
use cadence_core::controller::{CadenceController, CadenceError};
use cadence_core::policy::CadenceConfig;
use cadence_core::signal::{CadenceDelegate, ThroughputEstimator};
use cadence_core::time::Period;

use crate::coarse::RunLoopTimer;
use crate::high_res::DispatchTimer;
use crate::run_loop::RunLoop;

/// Either run loop backend, chosen by [`BackendKind`].
#[derive(Debug)]
pub enum LoopBackend {
    /// [`RunLoopTimer`].
    Coarse(RunLoopTimer),
    /// [`DispatchTimer`].
    HighRes(DispatchTimer),
}

impl LoopBackend {
    /// Builds the backend for `kind` on `run_loop`.
    ///
    /// `leeway` only applies to [`BackendKind::HighRes`].
    #[must_use]
    pub fn new(kind: BackendKind, run_loop: &RunLoop, leeway: Period) -> Self {
        match kind {
            BackendKind::Coarse => Self::Coarse(RunLoopTimer::new(run_loop)),
            BackendKind::HighRes => Self::HighRes(DispatchTimer::new(run_loop, leeway)),
        }
    }

    fn as_dyn(&self) -> &dyn TimerBackend {
        match self {
            Self::Coarse(timer) => timer,
            Self::HighRes(timer) => timer,
        }
    }

    fn as_dyn_mut(&mut self) -> &mut dyn TimerBackend {
        match self {
            Self::Coarse(timer) => timer,
            Self::HighRes(timer) => timer,
        }
    }
}

impl TimerBackend for LoopBackend {
    fn kind(&self) -> BackendKind {
        self.as_dyn().kind()
    }

    fn arm(&mut self, period: Period, on_fire: FireCallback) -> Result<(), TimerError> {
        self.as_dyn_mut().arm(period, on_fire)
    }

    fn cancel(&mut self) {
        self.as_dyn_mut().cancel();
    }

    fn is_valid(&self) -> bool {
        self.as_dyn().is_valid()
    }

    fn installed_period(&self) -> Period {
        self.as_dyn().installed_period()
    }

    fn will_start_live_resize(&mut self) {
        self.as_dyn_mut().will_start_live_resize();
    }

    fn rearm_for_live_resize(
        &mut self,
        active_period: Period,
        on_fire: FireCallback,
    ) -> Result<(), TimerError> {
        self.as_dyn_mut().rearm_for_live_resize(active_period, on_fire)
    }
}

/// Builds a controller driving a `kind` backend on `run_loop`, using the
/// config's leeway.
///
/// # Errors
///
/// Returns [`CadenceError::InvalidConfig`] if `config` is invalid.
pub fn cadence_controller(
    run_loop: &RunLoop,
    kind: BackendKind,
    delegate: Weak<dyn CadenceDelegate>,
    estimator: Rc<dyn ThroughputEstimator>,
    config: CadenceConfig,
) -> Result<CadenceController<LoopBackend>, CadenceError> {
    let backend = LoopBackend::new(kind, run_loop, config.leeway);
    CadenceController::new(backend, delegate, estimator, config)
}
