// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for cadence decisions.
//!
//! This module provides a [`TraceSink`] trait with one method per event the
//! controller emits. All method bodies default to no-ops, so implementing
//! only the events you care about is fine.
//!
//! [`Tracer`] owns an optional boxed sink. When the `trace` feature is
//! **off**, [`Tracer::emit`] compiles to nothing. When **on**, it performs a
//! single `Option` branch before dispatching. [`TraceEvent`] carries any one
//! event, for callers that queue events before delivering them.
//!
//! `TraceSink` is implemented for `Rc<RefCell<S>>`, so a caller can keep a
//! handle to a sink it gave to the controller and read it back later.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer::emit` body (one branch per call).

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;

use crate::backend::{BackendKind, TimerError};
use crate::policy::{PeriodReason, TargetPeriod};
use crate::signal::SignalSnapshot;
use crate::time::{HostTime, Period};

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted after the policy has computed a target.
#[derive(Clone, Copy, Debug)]
pub struct EvaluatedEvent {
    /// Whether the evaluation was forced (deferral resolution).
    pub forced: bool,
    /// Result of `SignalSnapshot::effectively_active`.
    pub effectively_active: bool,
    /// Whether the surface was visible.
    pub visible: bool,
    /// Throughput reading used for the evaluation.
    pub throughput: u64,
    /// The computed target.
    pub target: Period,
    /// Branch that chose the target.
    pub reason: PeriodReason,
    /// Whether a live resize override applied.
    pub live_resizing: bool,
}

impl EvaluatedEvent {
    /// Builds the event from a snapshot and its policy output.
    #[must_use]
    pub fn new(snapshot: &SignalSnapshot, target: &TargetPeriod, forced: bool) -> Self {
        Self {
            forced,
            effectively_active: snapshot.effectively_active(),
            visible: snapshot.visible,
            throughput: snapshot.current_throughput_estimate,
            target: target.period,
            reason: target.reason,
            live_resizing: target.allow_live_resize_override,
        }
    }
}

/// Emitted when a new period is installed.
#[derive(Clone, Copy, Debug)]
pub struct AppliedEvent {
    /// Period before the change ([`Period::UNSET`] if none).
    pub from: Period,
    /// Newly installed period.
    pub to: Period,
    /// Whether the change bypassed the deferral gate.
    pub forced: bool,
}

/// Emitted when a slow-down is postponed to the next fire.
#[derive(Clone, Copy, Debug)]
pub struct DeferredEvent {
    /// Period that stays installed.
    pub installed: Period,
    /// Period that will be re-evaluated on the next fire.
    pub proposed: Period,
}

/// Emitted when live resize forces the active period.
#[derive(Clone, Copy, Debug)]
pub struct LiveResizeOverrideEvent {
    /// Target cached for after the resize.
    pub target: Period,
    /// Period the timer actually runs at.
    pub forced_period: Period,
}

/// Emitted on live resize begin and end notifications.
#[derive(Clone, Copy, Debug)]
pub struct LiveResizeEvent {
    /// `true` for begin, `false` for end.
    pub began: bool,
    /// Backend that received the notification.
    pub backend: BackendKind,
}

/// Emitted once per timer fire, before the redraw callback.
#[derive(Clone, Copy, Debug)]
pub struct TickEvent {
    /// Number of fires so far, starting at zero.
    pub tick_index: u64,
    /// Host time the fire was delivered at.
    pub now: HostTime,
    /// Period installed when the fire was handled.
    pub period: Period,
    /// Whether a deferred slow-down was resolved on this fire.
    pub resolved_deferral: bool,
}

/// Emitted when a timer could not be armed from a context without a caller
/// to return the error to (a timer fire).
#[derive(Clone, Copy, Debug)]
pub struct TimerFailureEvent {
    /// The backend error.
    pub error: TimerError,
}

/// Any one controller event.
///
/// The controller queues these while it updates its state and hands them to
/// the sink once it has let go of that state, so a sink may call back into
/// the controller.
#[derive(Clone, Copy, Debug)]
pub enum TraceEvent {
    /// See [`TraceSink::on_evaluated`].
    Evaluated(EvaluatedEvent),
    /// See [`TraceSink::on_applied`].
    Applied(AppliedEvent),
    /// See [`TraceSink::on_deferred`].
    Deferred(DeferredEvent),
    /// See [`TraceSink::on_live_resize_override`].
    LiveResizeOverride(LiveResizeOverrideEvent),
    /// See [`TraceSink::on_live_resize`].
    LiveResize(LiveResizeEvent),
    /// See [`TraceSink::on_tick`].
    Tick(TickEvent),
    /// See [`TraceSink::on_timer_failure`].
    TimerFailure(TimerFailureEvent),
    /// See [`TraceSink::on_teardown`].
    Teardown,
}

impl TraceEvent {
    /// Calls the [`TraceSink`] method matching this event.
    pub fn dispatch<S: TraceSink + ?Sized>(&self, sink: &mut S) {
        match self {
            Self::Evaluated(e) => sink.on_evaluated(e),
            Self::Applied(e) => sink.on_applied(e),
            Self::Deferred(e) => sink.on_deferred(e),
            Self::LiveResizeOverride(e) => sink.on_live_resize_override(e),
            Self::LiveResize(e) => sink.on_live_resize(e),
            Self::Tick(e) => sink.on_tick(e),
            Self::TimerFailure(e) => sink.on_timer_failure(e),
            Self::Teardown => sink.on_teardown(),
        }
    }
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the cadence controller.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called after every policy evaluation.
    fn on_evaluated(&mut self, e: &EvaluatedEvent) {
        _ = e;
    }

    /// Called when a period is installed.
    fn on_applied(&mut self, e: &AppliedEvent) {
        _ = e;
    }

    /// Called when a slow-down is deferred.
    fn on_deferred(&mut self, e: &DeferredEvent) {
        _ = e;
    }

    /// Called when live resize forces the active period.
    fn on_live_resize_override(&mut self, e: &LiveResizeOverrideEvent) {
        _ = e;
    }

    /// Called on live resize begin and end.
    fn on_live_resize(&mut self, e: &LiveResizeEvent) {
        _ = e;
    }

    /// Called for each fire, before the redraw callback.
    fn on_tick(&mut self, e: &TickEvent) {
        _ = e;
    }

    /// Called when re-arming fails inside a fire.
    fn on_timer_failure(&mut self, e: &TimerFailureEvent) {
        _ = e;
    }

    /// Called once when the controller is torn down.
    fn on_teardown(&mut self) {}
}

impl<S: TraceSink + ?Sized> TraceSink for Rc<RefCell<S>> {
    fn on_evaluated(&mut self, e: &EvaluatedEvent) {
        self.borrow_mut().on_evaluated(e);
    }

    fn on_applied(&mut self, e: &AppliedEvent) {
        self.borrow_mut().on_applied(e);
    }

    fn on_deferred(&mut self, e: &DeferredEvent) {
        self.borrow_mut().on_deferred(e);
    }

    fn on_live_resize_override(&mut self, e: &LiveResizeOverrideEvent) {
        self.borrow_mut().on_live_resize_override(e);
    }

    fn on_live_resize(&mut self, e: &LiveResizeEvent) {
        self.borrow_mut().on_live_resize(e);
    }

    fn on_tick(&mut self, e: &TickEvent) {
        self.borrow_mut().on_tick(e);
    }

    fn on_timer_failure(&mut self, e: &TimerFailureEvent) {
        self.borrow_mut().on_timer_failure(e);
    }

    fn on_teardown(&mut self) {
        self.borrow_mut().on_teardown();
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Owner of an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, [`emit`](Self::emit) compiles to
/// nothing and the sink is dropped on installation. When **on**, it checks
/// the inner `Option` (one branch) before dispatching to the sink.
#[derive(Default)]
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Box<dyn TraceSink>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl Tracer {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: Box<dyn TraceSink>) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {}
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if events reach a sink.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }

    /// Delivers `e` to the sink, if any.
    #[inline]
    pub fn emit(&mut self, e: &TraceEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            e.dispatch(s.as_mut());
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
