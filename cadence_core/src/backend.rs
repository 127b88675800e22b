// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Timer backend contract.
//!
//! A backend owns at most one repeating timer on behalf of one controller and
//! invokes a [`FireCallback`] each time it fires. Two kinds exist:
//!
//! - [`BackendKind::Coarse`]: a run-loop timer. It only fires while the
//!   loop runs in a mode the timer is registered for, so it must be added to
//!   the event-tracking mode when a live resize starts its nested loop.
//! - [`BackendKind::HighRes`]: a dispatch-style source serviced in every
//!   mode, with a small coalescing leeway to reduce wake-ups.
//!
//! The backend kind is chosen once, when the controller is built. The
//! controller only talks to the [`TimerBackend`] trait.
//!
//! # Ownership
//!
//! The controller owns its backend. The callback a backend receives holds
//! only a weak handle back to the controller, so an installed timer never
//! keeps its owner alive, and the controller cancels the timer before it is
//! destroyed.

use alloc::rc::Rc;
use core::fmt;

use crate::time::{HostTime, Period};

/// Callback a backend invokes on every fire, on the designated context.
///
/// The argument is the host time the fire was delivered at.
pub type FireCallback = Rc<dyn Fn(HostTime)>;

/// Which timer primitive a backend wraps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Run-loop timer, fires only in the modes it is registered for.
    Coarse,
    /// High-resolution dispatch source with coalescing leeway.
    HighRes,
}

/// Errors from [`TimerBackend`] operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerError {
    /// A zero period was requested.
    InvalidPeriod,
    /// The execution context the timer would run on no longer exists.
    LoopUnavailable,
    /// The owner has been torn down and accepts no new timers.
    Terminated,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPeriod => f.write_str("timer period must be non-zero"),
            Self::LoopUnavailable => f.write_str("timer execution context is gone"),
            Self::Terminated => f.write_str("timer owner has been torn down"),
        }
    }
}

impl core::error::Error for TimerError {}

/// A cancellable, re-armable repeating timer.
///
/// All methods run on the designated execution context and never block.
/// Implementations must never have two live timers at once: arming
/// replaces, it does not add.
pub trait TimerBackend {
    /// Which primitive this backend wraps.
    fn kind(&self) -> BackendKind;

    /// Installs a repeating timer at `period`, cancelling any installed
    /// timer first.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidPeriod`] for [`Period::UNSET`], or a
    /// backend-specific error if the timer cannot be created. On error no
    /// timer is installed.
    fn arm(&mut self, period: Period, on_fire: FireCallback) -> Result<(), TimerError>;

    /// Removes the installed timer, if any. Idempotent.
    ///
    /// After this returns the previous callback is never invoked again, even
    /// if a fire was already due.
    fn cancel(&mut self);

    /// Returns `true` iff a timer is installed and has not been invalidated.
    fn is_valid(&self) -> bool;

    /// Returns the period of the installed timer, or [`Period::UNSET`].
    fn installed_period(&self) -> Period;

    /// Prepares the installed timer for a live resize's nested loop.
    ///
    /// The default does nothing; backends whose timers are mode-bound
    /// override it.
    fn will_start_live_resize(&mut self) {}

    /// Forces the timer to `active_period` for the duration of a live
    /// resize, regardless of the cadence target.
    ///
    /// # Errors
    ///
    /// As for [`arm`](Self::arm).
    fn rearm_for_live_resize(
        &mut self,
        active_period: Period,
        on_fire: FireCallback,
    ) -> Result<(), TimerError>;
}

impl<B: TimerBackend + ?Sized> TimerBackend for alloc::boxed::Box<B> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn arm(&mut self, period: Period, on_fire: FireCallback) -> Result<(), TimerError> {
        (**self).arm(period, on_fire)
    }

    fn cancel(&mut self) {
        (**self).cancel();
    }

    fn is_valid(&self) -> bool {
        (**self).is_valid()
    }

    fn installed_period(&self) -> Period {
        (**self).installed_period()
    }

    fn will_start_live_resize(&mut self) {
        (**self).will_start_live_resize();
    }

    fn rearm_for_live_resize(
        &mut self,
        active_period: Period,
        on_fire: FireCallback,
    ) -> Result<(), TimerError> {
        (**self).rearm_for_live_resize(active_period, on_fire)
    }
}
