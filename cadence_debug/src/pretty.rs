// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Host times
//! are printed in milliseconds.

use std::io::Write;

use cadence_core::backend::BackendKind;
use cadence_core::policy::PeriodReason;
use cadence_core::time::HostTime;
use cadence_core::trace::{
    AppliedEvent, DeferredEvent, EvaluatedEvent, LiveResizeEvent, LiveResizeOverrideEvent,
    TickEvent, TimerFailureEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    ticks: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self::with_writer(writer)
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            ticks: true,
        }
    }

    /// Suppresses `[tick]` lines, which dominate long traces.
    #[must_use]
    pub fn without_ticks(mut self) -> Self {
        self.ticks = false;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn host_ms(t: HostTime) -> f64 {
    t.nanos() as f64 / 1_000_000.0
}

fn reason_name(reason: PeriodReason) -> &'static str {
    match reason {
        PeriodReason::Background => "background",
        PeriodReason::AdaptiveFast => "adaptive-fast",
        PeriodReason::AdaptiveSlow => "adaptive-slow",
        PeriodReason::Active => "active",
    }
}

fn backend_name(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Coarse => "coarse",
        BackendKind::HighRes => "high-res",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_evaluated(&mut self, e: &EvaluatedEvent) {
        let forced = if e.forced { " forced" } else { "" };
        let _ = writeln!(
            self.writer,
            "[eval]{forced} active={} visible={} throughput={} resizing={} -> {} ({})",
            e.effectively_active,
            e.visible,
            e.throughput,
            e.live_resizing,
            e.target,
            reason_name(e.reason),
        );
    }

    fn on_applied(&mut self, e: &AppliedEvent) {
        let forced = if e.forced { " forced" } else { "" };
        let _ = writeln!(self.writer, "[applied]{forced} {} -> {}", e.from, e.to);
    }

    fn on_deferred(&mut self, e: &DeferredEvent) {
        let _ = writeln!(
            self.writer,
            "[deferred] keeping {} until next fire, proposed {}",
            e.installed, e.proposed,
        );
    }

    fn on_live_resize_override(&mut self, e: &LiveResizeOverrideEvent) {
        let _ = writeln!(
            self.writer,
            "[override] running {} during resize, target {}",
            e.forced_period, e.target,
        );
    }

    fn on_live_resize(&mut self, e: &LiveResizeEvent) {
        let edge = if e.began { "begin" } else { "end" };
        let _ = writeln!(
            self.writer,
            "[resize:{edge}] backend={}",
            backend_name(e.backend),
        );
    }

    fn on_tick(&mut self, e: &TickEvent) {
        if !self.ticks {
            return;
        }
        let resolved = if e.resolved_deferral { " resolved" } else { "" };
        let _ = writeln!(
            self.writer,
            "[tick] index={} now={:.1}ms period={}{resolved}",
            e.tick_index,
            host_ms(e.now),
            e.period,
        );
    }

    fn on_timer_failure(&mut self, e: &TimerFailureEvent) {
        let _ = writeln!(self.writer, "[failure] {}", e.error);
    }

    fn on_teardown(&mut self) {
        let _ = writeln!(self.writer, "[teardown]");
    }
}
