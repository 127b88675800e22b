// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, histograms, and Chrome trace export for
//! cadence diagnostics.
//!
//! This crate provides [`TraceSink`](cadence_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`]: compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`histogram::CadenceHistogram`]: tick counts per installed period and
//!   change statistics, exportable as JSON.
//! - [`chrome::export`]: writes Chrome Trace Event Format JSON from recorded
//!   bytes.
//!
//! Several sinks can observe the same controller through
//! [`FanOut`].

use cadence_core::trace::{
    AppliedEvent, DeferredEvent, EvaluatedEvent, LiveResizeEvent, LiveResizeOverrideEvent,
    TickEvent, TimerFailureEvent, TraceSink,
};

pub mod chrome;
pub mod histogram;
pub mod pretty;
pub mod recorder;

/// Forwards every event to each of its sinks in order.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn TraceSink>>,
}

impl std::fmt::Debug for FanOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOut")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl FanOut {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    #[must_use]
    pub fn with(mut self, sink: impl TraceSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl TraceSink for FanOut {
    fn on_evaluated(&mut self, e: &EvaluatedEvent) {
        self.sinks.iter_mut().for_each(|s| s.on_evaluated(e));
    }

    fn on_applied(&mut self, e: &AppliedEvent) {
        self.sinks.iter_mut().for_each(|s| s.on_applied(e));
    }

    fn on_deferred(&mut self, e: &DeferredEvent) {
        self.sinks.iter_mut().for_each(|s| s.on_deferred(e));
    }

    fn on_live_resize_override(&mut self, e: &LiveResizeOverrideEvent) {
        self.sinks.iter_mut().for_each(|s| s.on_live_resize_override(e));
    }

    fn on_live_resize(&mut self, e: &LiveResizeEvent) {
        self.sinks.iter_mut().for_each(|s| s.on_live_resize(e));
    }

    fn on_tick(&mut self, e: &TickEvent) {
        self.sinks.iter_mut().for_each(|s| s.on_tick(e));
    }

    fn on_timer_failure(&mut self, e: &TimerFailureEvent) {
        self.sinks.iter_mut().for_each(|s| s.on_timer_failure(e));
    }

    fn on_teardown(&mut self) {
        self.sinks.iter_mut().for_each(|s| s.on_teardown());
    }
}
