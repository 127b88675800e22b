// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host clocks for the run loop.
//!
//! [`MonotonicClock`] reads `CLOCK_MONOTONIC` and sleeps with `nanosleep`.
//! [`ManualClock`] is virtual time: waiting jumps straight to the deadline,
//! which makes run loop scenarios deterministic.

use std::cell::Cell;

use cadence_core::time::{HostTime, Period};
use rustix::thread::{NanosleepRelativeResult, nanosleep};
use rustix::time::{ClockId, Timespec, clock_gettime};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// A monotonic time source the run loop can block on.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> HostTime;

    /// Blocks until [`now`](Self::now) is at least `deadline`.
    ///
    /// Returns immediately if the deadline has passed.
    fn wait_until(&self, deadline: HostTime);
}

/// `CLOCK_MONOTONIC`, read and slept on through `rustix`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> HostTime {
        timespec_to_host_time(clock_gettime(ClockId::Monotonic))
    }

    fn wait_until(&self, deadline: HostTime) {
        sleep_until(|| self.now(), deadline, |remaining| {
            match nanosleep(&period_to_timespec(remaining)) {
                // Signals cut the sleep short; the caller recomputes from the clock.
                NanosleepRelativeResult::Ok | NanosleepRelativeResult::Interrupted(_) => {}
                NanosleepRelativeResult::Err(_) => std::thread::sleep(remaining.into()),
            }
        });
    }
}

/// Calls `step` with the remaining time until `now()` reaches `deadline`.
///
/// The clock is re-read after every step, so a step that wakes early or
/// fails outright never ends the wait before the deadline.
fn sleep_until(now: impl Fn() -> HostTime, deadline: HostTime, mut step: impl FnMut(Period)) {
    loop {
        let remaining = deadline.saturating_duration_since(now());
        if remaining.is_unset() {
            return;
        }
        step(remaining);
    }
}

fn timespec_to_host_time(timespec: Timespec) -> HostTime {
    let seconds = u64::try_from(timespec.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(timespec.tv_nsec)
        .unwrap_or(0)
        .min(NANOS_PER_SECOND - 1);
    HostTime(
        seconds
            .saturating_mul(NANOS_PER_SECOND)
            .saturating_add(nanos),
    )
}

fn period_to_timespec(period: Period) -> Timespec {
    let nanos = period.as_nanos();
    Timespec {
        tv_sec: i64::try_from(nanos / NANOS_PER_SECOND).unwrap_or(i64::MAX),
        tv_nsec: i64::try_from(nanos % NANOS_PER_SECOND).unwrap_or(0),
    }
}

/// Virtual time that only moves when told to.
///
/// [`wait_until`](Clock::wait_until) advances the clock to the deadline
/// without sleeping.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<HostTime>,
}

impl ManualClock {
    /// Creates a clock reading `start`.
    #[must_use]
    pub const fn new(start: HostTime) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Period) {
        self.now.set(self.now.get().saturating_add(by));
    }

    /// Sets the clock, never moving it backwards.
    pub fn set(&self, to: HostTime) {
        if to > self.now.get() {
            self.now.set(to);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> HostTime {
        self.now.get()
    }

    fn wait_until(&self, deadline: HostTime) {
        self.set(deadline);
    }
}
