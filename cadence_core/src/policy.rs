// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Period policy: from a [`SignalSnapshot`] to a target period.
//!
//! The policy is a pure function of the snapshot and a [`CadenceConfig`].
//! Branches are evaluated in order and the first match wins:
//!
//! 1. Not effectively active, or not visible: the background period.
//! 2. Adaptive mode with `0 < throughput < threshold`: the fast period.
//! 3. Adaptive mode otherwise: `1 / slow_frame_rate`.
//! 4. Non-adaptive: the active period.
//!
//! Visibility and activity therefore outrank throughput: a hidden surface
//! never ticks faster than the background period.

use crate::signal::SignalSnapshot;
use crate::time::Period;

/// Construction-time cadence constants.
///
/// Passed once to the controller; nothing here changes at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CadenceConfig {
    /// Period used in adaptive mode while throughput is low and non-zero.
    pub fast_period: Period,
    /// Period used for an active, visible session without adaptive mode,
    /// and forced during live resize.
    pub active_period: Period,
    /// Period for hidden or inactive sessions. Still non-zero so passive
    /// indicators (badges, attention marks) keep updating.
    pub background_period: Period,
    /// Coalescing tolerance for the high-resolution backend.
    pub leeway: Period,
}

impl CadenceConfig {
    /// 60 Hz fast, 20 Hz active, 1 Hz background, 5 ms leeway.
    pub const DEFAULT: Self = Self {
        // 1/60 s, rounded to the nearest nanosecond.
        fast_period: Period(16_666_667),
        active_period: Period::from_millis(50),
        background_period: Period::from_millis(1_000),
        leeway: Period::from_millis(5),
    };

    /// Checks the invariants the controller relies on.
    ///
    /// # Errors
    ///
    /// Returns a static description of the first violated invariant.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.fast_period.is_unset()
            || self.active_period.is_unset()
            || self.background_period.is_unset()
        {
            return Err("cadence periods must be non-zero");
        }
        if self.fast_period > self.active_period || self.active_period > self.background_period {
            return Err("cadence periods must satisfy fast <= active <= background");
        }
        Ok(())
    }
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Which policy branch produced a [`TargetPeriod`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PeriodReason {
    /// Hidden or inactive.
    Background,
    /// Adaptive mode with low, non-zero throughput.
    AdaptiveFast,
    /// Adaptive mode with high or unmeasured throughput.
    AdaptiveSlow,
    /// Active and visible without adaptive mode.
    Active,
}

/// Output of [`compute_target_period`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetPeriod {
    /// The period the timer should run at.
    pub period: Period,
    /// Whether a live resize is in progress, in which case the controller
    /// runs the timer at the active period and keeps `period` cached as the
    /// post-resize target.
    pub allow_live_resize_override: bool,
    /// The branch that chose `period`.
    pub reason: PeriodReason,
}

/// Maps a snapshot to the period the timer should run at.
#[must_use]
pub fn compute_target_period(snapshot: &SignalSnapshot, config: &CadenceConfig) -> TargetPeriod {
    let (period, reason) = if snapshot.effectively_active() && snapshot.visible {
        if snapshot.adaptive_frame_rate_enabled {
            let throughput = snapshot.current_throughput_estimate;
            if throughput > 0 && throughput < snapshot.adaptive_throughput_threshold {
                (config.fast_period, PeriodReason::AdaptiveFast)
            } else {
                (
                    slow_period(snapshot.slow_frame_rate, config),
                    PeriodReason::AdaptiveSlow,
                )
            }
        } else {
            (config.active_period, PeriodReason::Active)
        }
    } else {
        (config.background_period, PeriodReason::Background)
    };

    TargetPeriod {
        period,
        allow_live_resize_override: snapshot.live_resizing,
        reason,
    }
}

/// `1 / rate`, kept within `[fast_period, background_period]`.
fn slow_period(slow_frame_rate: f64, config: &CadenceConfig) -> Period {
    match Period::from_hz(slow_frame_rate) {
        Some(period) => period.clamp_to(config.fast_period, config.background_period),
        None => config.background_period,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::HostSignals;

    const CONFIG: CadenceConfig = CadenceConfig::DEFAULT;

    fn snapshot(host: HostSignals, throughput: u64) -> SignalSnapshot {
        SignalSnapshot::new(host, throughput)
    }

    fn visible_active() -> HostSignals {
        HostSignals {
            active: true,
            idle: false,
            visible: true,
            ..HostSignals::default()
        }
    }

    fn adaptive(slow_frame_rate: f64, threshold: u64) -> HostSignals {
        HostSignals {
            adaptive_frame_rate_enabled: true,
            adaptive_throughput_threshold: threshold,
            slow_frame_rate,
            ..visible_active()
        }
    }

    #[test]
    fn invisible_is_always_background() {
        let cases = [
            HostSignals {
                visible: false,
                ..visible_active()
            },
            HostSignals {
                visible: false,
                ..adaptive(30.0, 1_000)
            },
            HostSignals {
                visible: false,
                app_active: true,
                live_resizing: true,
                ..adaptive(30.0, 1_000)
            },
        ];
        for host in cases {
            for throughput in [0, 1, 999, 1_000, u64::MAX] {
                let target = compute_target_period(&snapshot(host, throughput), &CONFIG);
                assert_eq!(
                    target.period, CONFIG.background_period,
                    "host={host:?} throughput={throughput}"
                );
                assert_eq!(target.reason, PeriodReason::Background);
            }
        }
    }

    #[test]
    fn inactive_visible_is_background() {
        let host = HostSignals {
            active: false,
            idle: true,
            app_active: false,
            visible: true,
            ..HostSignals::default()
        };
        let target = compute_target_period(&snapshot(host, 0), &CONFIG);
        assert_eq!(target.period, CONFIG.background_period);
    }

    #[test]
    fn non_adaptive_active_visible_is_active_period() {
        for throughput in [0, 5, u64::MAX] {
            let target = compute_target_period(&snapshot(visible_active(), throughput), &CONFIG);
            assert_eq!(target.period, CONFIG.active_period);
            assert_eq!(target.reason, PeriodReason::Active);
        }
    }

    #[test]
    fn any_single_activity_signal_unlocks_foreground_periods() {
        let base = HostSignals {
            active: false,
            idle: true,
            app_active: false,
            visible: true,
            ..HostSignals::default()
        };
        for host in [
            HostSignals {
                active: true,
                ..base
            },
            HostSignals { idle: false, ..base },
            HostSignals {
                app_active: true,
                ..base
            },
        ] {
            let target = compute_target_period(&snapshot(host, 0), &CONFIG);
            assert_eq!(target.period, CONFIG.active_period, "host={host:?}");
        }
    }

    #[test]
    fn adaptive_low_throughput_is_fast() {
        let target = compute_target_period(&snapshot(adaptive(30.0, 1_000), 999), &CONFIG);
        assert_eq!(target.period, CONFIG.fast_period);
        assert_eq!(target.reason, PeriodReason::AdaptiveFast);

        let target = compute_target_period(&snapshot(adaptive(30.0, 1_000), 1), &CONFIG);
        assert_eq!(target.period, CONFIG.fast_period);
    }

    #[test]
    fn adaptive_high_throughput_uses_slow_rate() {
        let expected = Period::from_hz(30.0).unwrap();
        for throughput in [1_000, 1_001, u64::MAX] {
            let target = compute_target_period(&snapshot(adaptive(30.0, 1_000), throughput), &CONFIG);
            assert_eq!(target.period, expected, "throughput={throughput}");
            assert_eq!(target.reason, PeriodReason::AdaptiveSlow);
        }
    }

    #[test]
    fn adaptive_zero_throughput_is_not_fast() {
        let target = compute_target_period(&snapshot(adaptive(30.0, 1_000), 0), &CONFIG);
        assert_eq!(target.period, Period::from_hz(30.0).unwrap());
        assert_eq!(target.reason, PeriodReason::AdaptiveSlow);
    }

    #[test]
    fn slow_rate_is_clamped_into_configured_range() {
        let too_fast = compute_target_period(&snapshot(adaptive(240.0, 1), 5), &CONFIG);
        assert_eq!(too_fast.period, CONFIG.fast_period);

        let too_slow = compute_target_period(&snapshot(adaptive(0.1, 1), 5), &CONFIG);
        assert_eq!(too_slow.period, CONFIG.background_period);

        let nonsense = compute_target_period(&snapshot(adaptive(f64::NAN, 1), 5), &CONFIG);
        assert_eq!(nonsense.period, CONFIG.background_period);

        let zero = compute_target_period(&snapshot(adaptive(0.0, 1), 5), &CONFIG);
        assert_eq!(zero.period, CONFIG.background_period);
    }

    #[test]
    fn live_resize_flag_is_reported_not_applied() {
        let host = HostSignals {
            live_resizing: true,
            ..visible_active()
        };
        let target = compute_target_period(&snapshot(host, 0), &CONFIG);
        assert!(target.allow_live_resize_override);
        assert_eq!(target.period, CONFIG.active_period);
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(CONFIG.validate(), Ok(()));
        assert_eq!(CONFIG.fast_period, Period::from_hz(60.0).unwrap());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let zero = CadenceConfig {
            fast_period: Period::UNSET,
            ..CONFIG
        };
        assert!(zero.validate().is_err());

        let inverted = CadenceConfig {
            active_period: Period::from_millis(2_000),
            ..CONFIG
        };
        assert!(inverted.validate().is_err());
    }
}
