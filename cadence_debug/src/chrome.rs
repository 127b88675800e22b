// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Ticks become instant events, the installed period becomes a counter
//! track, and each live resize becomes a duration slice.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use cadence_core::time::{HostTime, Period};

use crate::recorder::{RecordedEvent, decode};

const PID: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        let ts = host_us(recorded.at);
        match recorded.event {
            RecordedEvent::Tick(e) => {
                events.push(instant(
                    "Tick",
                    host_us(e.now),
                    json!({
                        "tick_index": e.tick_index,
                        "period_ms": period_ms(e.period),
                        "resolved_deferral": e.resolved_deferral,
                    }),
                ));
            }
            RecordedEvent::Evaluated(e) => {
                events.push(instant(
                    "Evaluate",
                    ts,
                    json!({
                        "forced": e.forced,
                        "effectively_active": e.effectively_active,
                        "visible": e.visible,
                        "throughput": e.throughput,
                        "live_resizing": e.live_resizing,
                        "target_ms": period_ms(e.target),
                        "reason": format!("{:?}", e.reason),
                    }),
                ));
            }
            RecordedEvent::Applied(e) => {
                events.push(json!({
                    "ph": "C",
                    "name": "period",
                    "cat": "Cadence",
                    "ts": ts,
                    "pid": PID,
                    "tid": 0,
                    "args": { "period_ms": period_ms(e.to) },
                }));
                if e.forced {
                    events.push(instant(
                        "ForcedChange",
                        ts,
                        json!({ "from_ms": period_ms(e.from) }),
                    ));
                }
            }
            RecordedEvent::Deferred(e) => {
                events.push(instant(
                    "Deferred",
                    ts,
                    json!({
                        "installed_ms": period_ms(e.installed),
                        "proposed_ms": period_ms(e.proposed),
                    }),
                ));
            }
            RecordedEvent::LiveResizeOverride(e) => {
                events.push(instant(
                    "LiveResizeOverride",
                    ts,
                    json!({
                        "target_ms": period_ms(e.target),
                        "forced_ms": period_ms(e.forced_period),
                    }),
                ));
            }
            RecordedEvent::LiveResize(e) => {
                let ph = if e.began { "B" } else { "E" };
                events.push(json!({
                    "ph": ph,
                    "name": "LiveResize",
                    "cat": "Cadence",
                    "ts": ts,
                    "pid": PID,
                    "tid": 0,
                    "args": { "backend": format!("{:?}", e.backend) },
                }));
            }
            RecordedEvent::TimerFailure(e) => {
                events.push(instant(
                    "TimerFailure",
                    ts,
                    json!({ "error": e.error.to_string() }),
                ));
            }
            RecordedEvent::Teardown => {
                events.push(instant("Teardown", ts, json!({})));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn instant(name: &str, ts: f64, args: Value) -> Value {
    json!({
        "ph": "i",
        "name": name,
        "cat": "Cadence",
        "ts": ts,
        "pid": PID,
        "tid": 0,
        "s": "g",
        "args": args,
    })
}

fn host_us(t: HostTime) -> f64 {
    t.nanos() as f64 / 1000.0
}

fn period_ms(p: Period) -> f64 {
    p.as_nanos() as f64 / 1_000_000.0
}
