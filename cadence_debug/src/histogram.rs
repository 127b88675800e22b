// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-period tick counts and change statistics.
//!
//! [`CadenceHistogram`] implements [`TraceSink`] and counts how many ticks
//! were delivered at each installed period, along with how often the
//! controller applied, deferred, or overrode a change. The result can be
//! written as JSON for dashboards or test fixtures.

use std::collections::BTreeMap;
use std::io::{self, Write};

use cadence_core::time::Period;
use cadence_core::trace::{
    AppliedEvent, DeferredEvent, LiveResizeEvent, LiveResizeOverrideEvent, TickEvent,
    TimerFailureEvent, TraceSink,
};
use serde_json::{Value, json};

/// Aggregated cadence statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CadenceHistogram {
    ticks: BTreeMap<Period, u64>,
    /// Changes installed.
    pub applied: u64,
    /// Of `applied`, those that bypassed the deferral gate.
    pub forced: u64,
    /// Slow-downs postponed to the next fire.
    pub deferred: u64,
    /// Deferrals resolved on a fire.
    pub resolved: u64,
    /// Evaluations replaced by the live-resize override.
    pub overrides: u64,
    /// Live resizes started.
    pub live_resizes: u64,
    /// Backend failures.
    pub failures: u64,
}

impl CadenceHistogram {
    /// Creates an empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many ticks were delivered at `period`.
    #[must_use]
    pub fn ticks_at(&self, period: Period) -> u64 {
        self.ticks.get(&period).copied().unwrap_or(0)
    }

    /// Returns the total number of ticks.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.ticks.values().sum()
    }

    /// Iterates over `(period, ticks)` pairs, fastest period first.
    pub fn iter(&self) -> impl Iterator<Item = (Period, u64)> + '_ {
        self.ticks.iter().map(|(&p, &n)| (p, n))
    }

    /// Renders the histogram as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let buckets: Vec<Value> = self
            .iter()
            .map(|(period, ticks)| {
                json!({
                    "period_ms": period.as_nanos() as f64 / 1_000_000.0,
                    "ticks": ticks,
                })
            })
            .collect();
        json!({
            "ticks": buckets,
            "total_ticks": self.total_ticks(),
            "applied": self.applied,
            "forced": self.forced,
            "deferred": self.deferred,
            "resolved": self.resolved,
            "overrides": self.overrides,
            "live_resizes": self.live_resizes,
            "failures": self.failures,
        })
    }

    /// Writes [`to_json`](Self::to_json) as pretty-printed JSON.
    pub fn write_json(&self, writer: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, &self.to_json())?;
        writeln!(writer)
    }
}

impl TraceSink for CadenceHistogram {
    fn on_applied(&mut self, e: &AppliedEvent) {
        self.applied += 1;
        if e.forced {
            self.forced += 1;
        }
    }

    fn on_deferred(&mut self, _e: &DeferredEvent) {
        self.deferred += 1;
    }

    fn on_live_resize_override(&mut self, _e: &LiveResizeOverrideEvent) {
        self.overrides += 1;
    }

    fn on_live_resize(&mut self, e: &LiveResizeEvent) {
        if e.began {
            self.live_resizes += 1;
        }
    }

    fn on_tick(&mut self, e: &TickEvent) {
        *self.ticks.entry(e.period).or_insert(0) += 1;
        if e.resolved_deferral {
            self.resolved += 1;
        }
    }

    fn on_timer_failure(&mut self, _e: &TimerFailureEvent) {
        self.failures += 1;
    }
}
