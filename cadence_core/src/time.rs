// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host time and repeat periods.
//!
//! [`HostTime`] is a point on the run loop's monotonic clock, in nanoseconds.
//!
//! [`Period`] is the repeat interval of a timer, also in nanoseconds.
//! [`Period::UNSET`] (zero) doubles as the "nothing installed" sentinel, so a
//! period is only ever *installed* when it is non-zero.

use core::fmt;
use core::ops::{Add, Sub};

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_MILLI: u64 = 1_000_000;

/// A point in time, in nanoseconds on a monotonic clock.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Returns the period elapsed since an earlier time, or
    /// [`Period::UNSET`] if `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Period {
        Period(self.0.saturating_sub(earlier.0))
    }

    /// Checked addition of a period.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, period: Period) -> Option<Self> {
        match self.0.checked_add(period.0) {
            Some(t) => Some(Self(t)),
            None => None,
        }
    }

    /// Saturating addition of a period.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, period: Period) -> Self {
        Self(self.0.saturating_add(period.0))
    }
}

/// Saturates at `u64::MAX` nanoseconds.
impl Add<Period> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Period) -> Self {
        self.saturating_add(rhs)
    }
}

/// Saturates at zero when `rhs` is later than `self`.
impl Sub for HostTime {
    type Output = Period;

    #[inline]
    fn sub(self, rhs: Self) -> Period {
        self.saturating_duration_since(rhs)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({})", self.0)
    }
}

/// A timer repeat period in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Period(pub u64);

impl Period {
    /// The "no period installed" sentinel.
    pub const UNSET: Self = Self(0);

    /// Creates a period from nanoseconds.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a period from milliseconds, saturating on overflow.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(NANOS_PER_MILLI))
    }

    /// Creates a period from fractional seconds.
    ///
    /// Negative and NaN inputs give [`Period::UNSET`]; values beyond the
    /// representable range saturate.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "float-to-int `as` saturates; negatives and NaN are filtered first"
    )]
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs <= 0.0 {
            return Self::UNSET;
        }
        Self((secs * NANOS_PER_SECOND as f64 + 0.5) as u64)
    }

    /// Creates the period of a rate given in hertz.
    ///
    /// Returns `None` when `hz` is not a finite positive number.
    #[must_use]
    pub fn from_hz(hz: f64) -> Option<Self> {
        if !hz.is_finite() || hz <= 0.0 {
            return None;
        }
        Some(Self::from_secs_f64(1.0 / hz))
    }

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the period in fractional seconds.
    #[inline]
    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SECOND as f64
    }

    /// Returns the rate this period repeats at, or `None` when unset.
    #[must_use]
    pub fn hz(self) -> Option<f64> {
        if self.is_unset() {
            None
        } else {
            Some(NANOS_PER_SECOND as f64 / self.0 as f64)
        }
    }

    /// Returns `true` for the [`Period::UNSET`] sentinel.
    #[inline]
    #[must_use]
    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// Clamps this period into `[min, max]`.
    #[inline]
    #[must_use]
    pub fn clamp_to(self, min: Self, max: Self) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }
}

impl From<Period> for core::time::Duration {
    fn from(period: Period) -> Self {
        Self::from_nanos(period.0)
    }
}

impl fmt::Debug for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Period({}ns)", self.0)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            f.write_str("unset")
        } else {
            write!(f, "{:.1}ms", self.0 as f64 / NANOS_PER_MILLI as f64)
        }
    }
}
