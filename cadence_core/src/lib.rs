// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adaptive redraw cadence for periodic-tick renderers.
//!
//! `cadence_core` decides how often a redraw timer should fire, given the
//! activity, visibility and throughput signals its owner reports, and drives
//! a repeating timer at that rate. It is `no_std` compatible (with `alloc`)
//! and has no dependencies; timer primitives live in backend crates.
//!
//! # Architecture
//!
//! ```text
//!   CadenceDelegate::host_signals() + ThroughputEstimator
//!       │
//!       ▼
//!   SignalSnapshot ──► compute_target_period() ──► TargetPeriod
//!                                                      │
//!                 ┌────────────────────────────────────┘
//!                 ▼
//!   DeferralGate ──► apply / defer ──► TimerBackend::arm()
//!                                          │ fire
//!                 ┌────────────────────────┘
//!                 ▼
//!   resolve deferred slow-down ──► CadenceDelegate::on_tick()
//! ```
//!
//! **[`time`]**: [`HostTime`](time::HostTime) and
//! [`Period`](time::Period), with `Period::UNSET` as the "no timer"
//! sentinel.
//!
//! **[`signal`]**: Host-reported signals, the per-evaluation snapshot, and
//! the delegate and estimator capabilities the controller consumes.
//!
//! **[`policy`]**: The pure period policy and its construction-time
//! [`CadenceConfig`](policy::CadenceConfig).
//!
//! **[`gate`]**: Hysteresis that applies speed-ups immediately and holds
//! slow-downs until one more tick has drawn.
//!
//! **[`backend`]**: The [`TimerBackend`](backend::TimerBackend) contract
//! shared by the coarse and high-resolution timers.
//!
//! **[`controller`]**: [`CadenceController`](controller::CadenceController),
//! which owns the state and ties the pieces together.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! cadence instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables the `Tracer::emit` body (one branch
//!   per event).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod backend;
pub mod controller;
pub mod gate;
pub mod policy;
pub mod signal;
pub mod time;
pub mod trace;
