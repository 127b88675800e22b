// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Signals the cadence policy reads.
//!
//! The host reports its activity and visibility as [`HostSignals`]; the
//! controller pairs them with the current reading of a
//! [`ThroughputEstimator`] to form an immutable [`SignalSnapshot`]. A snapshot
//! is built fresh for every evaluation and discarded afterwards.
//!
//! Application activation is a plain field here. Nothing in this crate
//! queries process-wide state.

/// Activity and visibility state reported by the host for one evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HostSignals {
    /// The session is the one the user is interacting with.
    pub active: bool,
    /// The session has produced no output recently.
    pub idle: bool,
    /// The host application is frontmost.
    pub app_active: bool,
    /// The drawing surface is on screen.
    pub visible: bool,
    /// An interactive window resize is in progress.
    pub live_resizing: bool,
    /// Whether cadence should follow measured throughput.
    pub adaptive_frame_rate_enabled: bool,
    /// Throughput below which the fast period is used, in the estimator's
    /// units (bytes per second for a terminal).
    pub adaptive_throughput_threshold: u64,
    /// Frame rate used when adaptive mode does not pick the fast period, in
    /// hertz.
    pub slow_frame_rate: f64,
}

impl Default for HostSignals {
    fn default() -> Self {
        Self {
            active: false,
            idle: true,
            app_active: false,
            visible: false,
            live_resizing: false,
            adaptive_frame_rate_enabled: false,
            adaptive_throughput_threshold: 10_000,
            slow_frame_rate: 15.0,
        }
    }
}

/// Everything the period policy looks at, captured at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalSnapshot {
    /// See [`HostSignals::active`].
    pub active: bool,
    /// See [`HostSignals::idle`].
    pub idle: bool,
    /// See [`HostSignals::app_active`].
    pub app_active: bool,
    /// See [`HostSignals::visible`].
    pub visible: bool,
    /// See [`HostSignals::live_resizing`].
    pub live_resizing: bool,
    /// See [`HostSignals::adaptive_frame_rate_enabled`].
    pub adaptive_frame_rate_enabled: bool,
    /// See [`HostSignals::adaptive_throughput_threshold`].
    pub adaptive_throughput_threshold: u64,
    /// See [`HostSignals::slow_frame_rate`].
    pub slow_frame_rate: f64,
    /// Most recent throughput estimate. Zero means "no measurement".
    pub current_throughput_estimate: u64,
}

impl SignalSnapshot {
    /// Combines host signals with a throughput reading.
    #[must_use]
    pub const fn new(host: HostSignals, current_throughput_estimate: u64) -> Self {
        Self {
            active: host.active,
            idle: host.idle,
            app_active: host.app_active,
            visible: host.visible,
            live_resizing: host.live_resizing,
            adaptive_frame_rate_enabled: host.adaptive_frame_rate_enabled,
            adaptive_throughput_threshold: host.adaptive_throughput_threshold,
            slow_frame_rate: host.slow_frame_rate,
            current_throughput_estimate,
        }
    }

    /// Whether the session counts as active for cadence purposes.
    ///
    /// Any one of "focused", "producing output" or "app frontmost" is enough.
    #[inline]
    #[must_use]
    pub const fn effectively_active(&self) -> bool {
        self.active || !self.idle || self.app_active
    }
}

/// Source of the throughput estimate consumed by adaptive mode.
pub trait ThroughputEstimator {
    /// Returns the current estimate. Zero means nothing has been measured.
    fn estimated_throughput(&self) -> u64;
}

/// An estimator that always reports the same value.
///
/// Useful for hosts without adaptive mode and for tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedThroughput(pub u64);

impl ThroughputEstimator for FixedThroughput {
    fn estimated_throughput(&self) -> u64 {
        self.0
    }
}

impl ThroughputEstimator for core::cell::Cell<u64> {
    fn estimated_throughput(&self) -> u64 {
        self.get()
    }
}

/// Capability the owner of a cadence controller provides.
///
/// Both methods are called on the designated execution context. The
/// controller never holds an internal borrow while calling either one, so
/// implementations may call back into the controller.
pub trait CadenceDelegate {
    /// Returns the host's current signals. Queried fresh on every evaluation.
    fn host_signals(&self) -> HostSignals;

    /// Performs the redraw work for one resolved timer fire.
    fn on_tick(&self);
}
