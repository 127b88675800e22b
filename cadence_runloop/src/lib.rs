// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Run loop execution context and timer backends for `cadence_core`.
//!
//! This crate provides the single designated execution context a
//! [`CadenceController`](cadence_core::controller::CadenceController) runs
//! on, and the two [`TimerBackend`](cadence_core::backend::TimerBackend)
//! implementations it can drive:
//!
//! | Backend | Kind | Modes | Leeway |
//! |---|---|---|---|
//! | [`RunLoopTimer`] | `Coarse` | `DEFAULT` (plus `EVENT_TRACKING` during live resize) | none |
//! | [`DispatchTimer`] | `HighRes` | `COMMON` | configured |
//!
//! [`LoopBackend`] picks one of them from a
//! [`BackendKind`](cadence_core::backend::BackendKind) when the controller
//! is built; [`cadence_controller`] does both steps at once.
//!
//! Time comes from a [`Clock`]: [`MonotonicClock`] for real hosts, or
//! [`ManualClock`] for deterministic tests and simulations.
//!
//! ```no_run
//! use std::rc::{Rc, Weak};
//!
//! use cadence_core::backend::BackendKind;
//! use cadence_core::policy::CadenceConfig;
//! use cadence_core::signal::{CadenceDelegate, FixedThroughput, HostSignals};
//! use cadence_core::time::Period;
//! use cadence_runloop::{MonotonicClock, RunLoop, RunLoopMode, cadence_controller};
//!
//! struct Surface;
//!
//! impl CadenceDelegate for Surface {
//!     fn host_signals(&self) -> HostSignals {
//!         HostSignals {
//!             active: true,
//!             visible: true,
//!             ..HostSignals::default()
//!         }
//!     }
//!
//!     fn on_tick(&self) {
//!         // redraw
//!     }
//! }
//!
//! let run_loop = RunLoop::new(Rc::new(MonotonicClock));
//! let surface = Rc::new(Surface);
//! let weak_surface = Rc::downgrade(&surface);
//! let delegate: Weak<dyn CadenceDelegate> = weak_surface;
//! let controller = cadence_controller(
//!     &run_loop,
//!     BackendKind::HighRes,
//!     delegate,
//!     Rc::new(FixedThroughput(0)),
//!     CadenceConfig::DEFAULT,
//! )?;
//! controller.change_cadence_if_needed()?;
//! run_loop.run_for(RunLoopMode::Default, Period::from_millis(1_000));
//! # Ok::<(), cadence_core::controller::CadenceError>(())
//! ```

mod clock;
mod coarse;
mod high_res;
mod registration;
mod run_loop;
mod select;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use coarse::RunLoopTimer;
pub use high_res::DispatchTimer;
pub use run_loop::{ModeSet, RunLoop, RunLoopMode, SourceId, TimerSpec, WeakRunLoop};
pub use select::{LoopBackend, cadence_controller};
