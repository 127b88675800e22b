// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as little-endian records, each prefixed with a tag and the host
//! time it was recorded at. [`decode`] reads them back as an iterator of
//! [`Recorded`] events.
//!
//! Only tick events carry their own timestamp. Other events are stamped with
//! the recorder's clock if one was installed with
//! [`RecorderSink::with_clock`], and with the most recent tick time
//! otherwise.

use cadence_core::backend::{BackendKind, TimerError};
use cadence_core::policy::PeriodReason;
use cadence_core::time::{HostTime, Period};
use cadence_core::trace::{
    AppliedEvent, DeferredEvent, EvaluatedEvent, LiveResizeEvent, LiveResizeOverrideEvent,
    TickEvent, TimerFailureEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_EVALUATED: u8 = 1;
const TAG_APPLIED: u8 = 2;
const TAG_DEFERRED: u8 = 3;
const TAG_LIVE_RESIZE_OVERRIDE: u8 = 4;
const TAG_LIVE_RESIZE: u8 = 5;
const TAG_TICK: u8 = 6;
const TAG_TIMER_FAILURE: u8 = 7;
const TAG_TEARDOWN: u8 = 8;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
    clock: Option<Box<dyn Fn() -> HostTime>>,
    last_tick: HostTime,
}

impl std::fmt::Debug for RecorderSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderSink")
            .field("bytes", &self.buf.len())
            .field("has_clock", &self.clock.is_some())
            .finish_non_exhaustive()
    }
}

impl RecorderSink {
    /// Creates an empty recorder that stamps events with the last tick time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty recorder that stamps events with `clock`.
    #[must_use]
    pub fn with_clock(clock: impl Fn() -> HostTime + 'static) -> Self {
        Self {
            clock: Some(Box::new(clock)),
            ..Self::default()
        }
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn begin(&mut self, tag: u8) {
        let at = self.clock.as_ref().map_or(self.last_tick, |clock| clock());
        self.write_u8(tag);
        self.write_u64(at.nanos());
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_period(&mut self, p: Period) {
        self.write_u64(p.as_nanos());
    }
}

fn reason_to_u8(reason: PeriodReason) -> u8 {
    match reason {
        PeriodReason::Background => 0,
        PeriodReason::AdaptiveFast => 1,
        PeriodReason::AdaptiveSlow => 2,
        PeriodReason::Active => 3,
    }
}

fn backend_to_u8(kind: BackendKind) -> u8 {
    match kind {
        BackendKind::Coarse => 0,
        BackendKind::HighRes => 1,
    }
}

fn error_to_u8(error: TimerError) -> u8 {
    match error {
        TimerError::InvalidPeriod => 0,
        TimerError::LoopUnavailable => 1,
        TimerError::Terminated => 2,
    }
}

impl TraceSink for RecorderSink {
    fn on_evaluated(&mut self, e: &EvaluatedEvent) {
        self.begin(TAG_EVALUATED);
        self.write_bool(e.forced);
        self.write_bool(e.effectively_active);
        self.write_bool(e.visible);
        self.write_bool(e.live_resizing);
        self.write_u64(e.throughput);
        self.write_period(e.target);
        self.write_u8(reason_to_u8(e.reason));
    }

    fn on_applied(&mut self, e: &AppliedEvent) {
        self.begin(TAG_APPLIED);
        self.write_period(e.from);
        self.write_period(e.to);
        self.write_bool(e.forced);
    }

    fn on_deferred(&mut self, e: &DeferredEvent) {
        self.begin(TAG_DEFERRED);
        self.write_period(e.installed);
        self.write_period(e.proposed);
    }

    fn on_live_resize_override(&mut self, e: &LiveResizeOverrideEvent) {
        self.begin(TAG_LIVE_RESIZE_OVERRIDE);
        self.write_period(e.target);
        self.write_period(e.forced_period);
    }

    fn on_live_resize(&mut self, e: &LiveResizeEvent) {
        self.begin(TAG_LIVE_RESIZE);
        self.write_bool(e.began);
        self.write_u8(backend_to_u8(e.backend));
    }

    fn on_tick(&mut self, e: &TickEvent) {
        self.last_tick = e.now;
        self.begin(TAG_TICK);
        self.write_u64(e.tick_index);
        self.write_u64(e.now.nanos());
        self.write_period(e.period);
        self.write_bool(e.resolved_deferral);
    }

    fn on_timer_failure(&mut self, e: &TimerFailureEvent) {
        self.begin(TAG_TIMER_FAILURE);
        self.write_u8(error_to_u8(e.error));
    }

    fn on_teardown(&mut self) {
        self.begin(TAG_TEARDOWN);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// An [`EvaluatedEvent`].
    Evaluated(EvaluatedEvent),
    /// An [`AppliedEvent`].
    Applied(AppliedEvent),
    /// A [`DeferredEvent`].
    Deferred(DeferredEvent),
    /// A [`LiveResizeOverrideEvent`].
    LiveResizeOverride(LiveResizeOverrideEvent),
    /// A [`LiveResizeEvent`].
    LiveResize(LiveResizeEvent),
    /// A [`TickEvent`].
    Tick(TickEvent),
    /// A [`TimerFailureEvent`].
    TimerFailure(TimerFailureEvent),
    /// Controller teardown.
    Teardown,
}

/// A decoded event and the host time it was recorded at.
#[derive(Clone, Copy, Debug)]
pub struct Recorded {
    /// When the event was recorded.
    pub at: HostTime,
    /// The event.
    pub event: RecordedEvent,
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`Recorded`] events.
///
/// Decoding stops at the first truncated or unknown record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn read_u8(&mut self) -> Option<u8> {
        let v = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_u64(&mut self) -> Option<u64> {
        let bytes = self.data.get(self.pos..self.pos + 8)?;
        let v = u64::from_le_bytes(bytes.try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_period(&mut self) -> Option<Period> {
        self.read_u64().map(Period)
    }

    fn read_reason(&mut self) -> Option<PeriodReason> {
        Some(match self.read_u8()? {
            0 => PeriodReason::Background,
            1 => PeriodReason::AdaptiveFast,
            2 => PeriodReason::AdaptiveSlow,
            _ => PeriodReason::Active,
        })
    }

    fn read_backend(&mut self) -> Option<BackendKind> {
        Some(match self.read_u8()? {
            0 => BackendKind::Coarse,
            _ => BackendKind::HighRes,
        })
    }

    fn read_error(&mut self) -> Option<TimerError> {
        Some(match self.read_u8()? {
            0 => TimerError::InvalidPeriod,
            1 => TimerError::LoopUnavailable,
            _ => TimerError::Terminated,
        })
    }

    fn decode_event(&mut self, tag: u8) -> Option<RecordedEvent> {
        Some(match tag {
            TAG_EVALUATED => RecordedEvent::Evaluated(EvaluatedEvent {
                forced: self.read_bool()?,
                effectively_active: self.read_bool()?,
                visible: self.read_bool()?,
                live_resizing: self.read_bool()?,
                throughput: self.read_u64()?,
                target: self.read_period()?,
                reason: self.read_reason()?,
            }),
            TAG_APPLIED => RecordedEvent::Applied(AppliedEvent {
                from: self.read_period()?,
                to: self.read_period()?,
                forced: self.read_bool()?,
            }),
            TAG_DEFERRED => RecordedEvent::Deferred(DeferredEvent {
                installed: self.read_period()?,
                proposed: self.read_period()?,
            }),
            TAG_LIVE_RESIZE_OVERRIDE => RecordedEvent::LiveResizeOverride(LiveResizeOverrideEvent {
                target: self.read_period()?,
                forced_period: self.read_period()?,
            }),
            TAG_LIVE_RESIZE => RecordedEvent::LiveResize(LiveResizeEvent {
                began: self.read_bool()?,
                backend: self.read_backend()?,
            }),
            TAG_TICK => RecordedEvent::Tick(TickEvent {
                tick_index: self.read_u64()?,
                now: HostTime(self.read_u64()?),
                period: self.read_period()?,
                resolved_deferral: self.read_bool()?,
            }),
            TAG_TIMER_FAILURE => RecordedEvent::TimerFailure(TimerFailureEvent {
                error: self.read_error()?,
            }),
            TAG_TEARDOWN => RecordedEvent::Teardown,
            _ => return None,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = Recorded;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        let at = HostTime(self.read_u64()?);
        let event = self.decode_event(tag)?;
        Some(Recorded { at, event })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn tick(tick_index: u64, now: u64) -> TickEvent {
        TickEvent {
            tick_index,
            now: HostTime(now),
            period: Period::from_millis(50),
            resolved_deferral: tick_index == 1,
        }
    }

    #[test]
    fn decodes_in_recording_order() {
        let mut rec = RecorderSink::new();
        rec.on_applied(&AppliedEvent {
            from: Period::UNSET,
            to: Period::from_millis(50),
            forced: false,
        });
        rec.on_tick(&tick(0, 50_000_000));
        rec.on_deferred(&DeferredEvent {
            installed: Period::from_millis(50),
            proposed: Period::from_millis(1_000),
        });
        rec.on_tick(&tick(1, 100_000_000));
        rec.on_teardown();

        let events: Vec<Recorded> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 5);
        assert!(matches!(
            events[0].event,
            RecordedEvent::Applied(AppliedEvent { forced: false, .. })
        ));
        assert_eq!(events[0].at, HostTime(0));
        match events[3].event {
            RecordedEvent::Tick(t) => {
                assert_eq!(t.tick_index, 1);
                assert!(t.resolved_deferral);
                assert_eq!(t.period, Period::from_millis(50));
            }
            other => panic!("expected tick, got {other:?}"),
        }
        assert_eq!(events[2].at, HostTime(50_000_000), "stamped with last tick");
        assert!(matches!(events[4].event, RecordedEvent::Teardown));
    }

    #[test]
    fn clock_stamps_untimed_events() {
        let now = Rc::new(Cell::new(HostTime(7)));
        let source = Rc::clone(&now);
        let mut rec = RecorderSink::with_clock(move || source.get());
        rec.on_live_resize(&LiveResizeEvent {
            began: true,
            backend: BackendKind::Coarse,
        });
        now.set(HostTime(9));
        rec.on_timer_failure(&TimerFailureEvent {
            error: TimerError::LoopUnavailable,
        });

        let events: Vec<Recorded> = decode(rec.as_bytes()).collect();
        assert_eq!(events[0].at, HostTime(7));
        assert_eq!(events[1].at, HostTime(9));
        assert!(matches!(
            events[1].event,
            RecordedEvent::TimerFailure(TimerFailureEvent {
                error: TimerError::LoopUnavailable
            })
        ));
    }

    #[test]
    fn truncated_recording_stops_cleanly() {
        let mut rec = RecorderSink::new();
        rec.on_tick(&tick(0, 10));
        rec.on_tick(&tick(1, 20));
        let bytes = rec.into_bytes();
        let cut = &bytes[..bytes.len() - 3];
        assert_eq!(decode(cut).count(), 1);
        assert_eq!(decode(&[0xFF, 0, 0, 0, 0, 0, 0, 0, 0]).count(), 0);
    }
}
