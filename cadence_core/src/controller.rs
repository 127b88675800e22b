// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The cadence controller: policy, gate, and backend wired together.
//!
//! ```text
//!   owner (CadenceDelegate)
//!     │ host_signals()                          ▲ on_tick()
//!     ▼                                         │
//!   SignalSnapshot ─► compute_target_period ─► DeferralGate ─► TimerBackend
//!                                                                   │ fire
//!                      resolve pending slow-down (force) ◄──────────┘
//! ```
//!
//! # Lifecycle
//!
//! A controller starts [`Uninitialized`](CadencePhase::Uninitialized) with no
//! timer. The first evaluation installs one and the controller is
//! [`Running`](CadencePhase::Running). [`teardown`](CadenceController::teardown)
//! (or dropping the controller) cancels the timer and moves it to
//! [`Terminated`](CadencePhase::Terminated); every later call is a no-op and
//! no tick is delivered after that point.
//!
//! # Slow-downs
//!
//! Every slow-down that is not forced goes through the [`DeferralGate`], no
//! matter which signal caused it. Losing visibility is no exception: the
//! surface gets one more tick at the installed rate, and the fire handler
//! then applies the background period before calling
//! [`on_tick`](CadenceDelegate::on_tick). Live resize is the one path that
//! bypasses the gate, since it always runs the timer at the active period.
//!
//! # Reentrancy
//!
//! The controller never holds its internal borrow while calling the
//! delegate, the throughput estimator, or a trace sink, so all of them may
//! call back into the controller. Trace events are queued while the state
//! is updated and delivered afterwards. A teardown requested while the
//! state is borrowed anyway (from inside
//! [`with_backend`](CadenceController::with_backend), say) is recorded and
//! carried out as soon as the borrow ends; until then the controller
//! already reports itself [`Terminated`](CadencePhase::Terminated) and
//! delivers no ticks.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::backend::{BackendKind, FireCallback, TimerBackend, TimerError};
use crate::gate::DeferralGate;
use crate::policy::{CadenceConfig, TargetPeriod, compute_target_period};
use crate::signal::{CadenceDelegate, SignalSnapshot, ThroughputEstimator};
use crate::time::{HostTime, Period};
use crate::trace::{
    AppliedEvent, DeferredEvent, EvaluatedEvent, LiveResizeEvent, LiveResizeOverrideEvent,
    TickEvent, TimerFailureEvent, TraceEvent, TraceSink, Tracer,
};

/// Errors from [`CadenceController`] operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CadenceError {
    /// The configuration violates an invariant.
    InvalidConfig(&'static str),
    /// The backend could not install a timer.
    Timer(TimerError),
}

impl fmt::Display for CadenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(reason) => write!(f, "invalid cadence config: {reason}"),
            Self::Timer(err) => write!(f, "timer backend failed: {err}"),
        }
    }
}

impl core::error::Error for CadenceError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::InvalidConfig(_) => None,
            Self::Timer(err) => Some(err),
        }
    }
}

impl From<TimerError> for CadenceError {
    fn from(err: TimerError) -> Self {
        Self::Timer(err)
    }
}

/// Outcome of one cadence evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CadenceChange {
    /// The target equals the installed period; nothing was touched.
    Unchanged,
    /// A new timer was installed.
    Applied {
        /// Previously installed period, or [`Period::UNSET`].
        from: Period,
        /// Newly installed period.
        to: Period,
    },
    /// A slow-down was postponed until the next fire.
    Deferred {
        /// Period that stays installed.
        installed: Period,
        /// Period the next fire will apply if signals are unchanged.
        proposed: Period,
    },
    /// A live resize is in progress; the timer runs at `forced`.
    LiveResizeOverride {
        /// Policy target, cached for after the resize.
        target: Period,
        /// Period the timer actually runs at.
        forced: Period,
    },
    /// The controller is torn down or its delegate is gone. In the latter
    /// case any installed timer has been cancelled.
    Inactive,
}

/// Lifecycle phase of a [`CadenceController`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CadencePhase {
    /// No timer installed yet.
    Uninitialized,
    /// A timer is installed and firing at the given period.
    Running(Period),
    /// Torn down; no further ticks.
    Terminated,
}

struct State<B> {
    backend: B,
    config: CadenceConfig,
    delegate: Weak<dyn CadenceDelegate>,
    estimator: Rc<dyn ThroughputEstimator>,
    gate: DeferralGate,
    /// Period the installed timer runs at, or UNSET.
    current_period: Period,
    /// Policy target cached while a live resize forces the active period.
    live_resize_target: Period,
    /// Whether the installed timer was armed through the live resize path.
    live_resize_armed: bool,
    terminated: bool,
    tick_count: u64,
    fire: FireCallback,
    /// Whether a sink is installed; nothing is queued otherwise.
    tracing: bool,
    /// Events waiting for the borrow to end.
    outbox: Vec<TraceEvent>,
}

struct Shared<B> {
    state: RefCell<State<B>>,
    tracer: RefCell<Tracer>,
    /// Teardown asked for while `state` was borrowed.
    teardown_requested: Cell<bool>,
}

/// Drives a [`TimerBackend`] at the cadence the policy asks for.
///
/// The controller owns its backend. The callback it hands to the backend
/// holds only a weak reference back, so a pending fire never keeps the
/// controller alive.
pub struct CadenceController<B: TimerBackend + 'static> {
    inner: Rc<Shared<B>>,
}

impl<B: TimerBackend + 'static> fmt::Debug for CadenceController<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("CadenceController");
        if let Ok(s) = self.inner.state.try_borrow() {
            d.field("backend", &s.backend.kind())
                .field("current_period", &s.current_period)
                .field("deferred", &s.gate.is_pending())
                .field("terminated", &self.inner.stopped(&s))
                .field("tick_count", &s.tick_count);
        }
        d.finish_non_exhaustive()
    }
}

impl<B: TimerBackend + 'static> CadenceController<B> {
    /// Creates a controller. No timer is installed until the first
    /// evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`CadenceError::InvalidConfig`] if `config` fails
    /// [`CadenceConfig::validate`].
    pub fn new(
        backend: B,
        delegate: Weak<dyn CadenceDelegate>,
        estimator: Rc<dyn ThroughputEstimator>,
        config: CadenceConfig,
    ) -> Result<Self, CadenceError> {
        config.validate().map_err(CadenceError::InvalidConfig)?;
        let inner = Rc::new_cyclic(|weak: &Weak<Shared<B>>| {
            let weak = weak.clone();
            let fire: FireCallback = Rc::new(move |now| handle_fire(&weak, now));
            Shared {
                state: RefCell::new(State {
                    backend,
                    config,
                    delegate,
                    estimator,
                    gate: DeferralGate::new(),
                    current_period: Period::UNSET,
                    live_resize_target: Period::UNSET,
                    live_resize_armed: false,
                    terminated: false,
                    tick_count: 0,
                    fire,
                    tracing: false,
                    outbox: Vec::new(),
                }),
                tracer: RefCell::new(Tracer::none()),
                teardown_requested: Cell::new(false),
            }
        });
        Ok(Self { inner })
    }

    /// Installs a trace sink. Events only reach it with the `trace` feature.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a trace sink.
    pub fn set_trace_sink(&self, sink: Box<dyn TraceSink>) {
        let tracer = Tracer::new(sink);
        self.inner.state.borrow_mut().tracing = tracer.is_enabled();
        *self.inner.tracer.borrow_mut() = tracer;
    }

    /// Re-evaluates the cadence and applies or defers the result.
    ///
    /// A no-op when the target equals the installed period.
    ///
    /// # Errors
    ///
    /// Returns [`CadenceError::Timer`] if a new timer could not be armed. No
    /// timer is installed afterwards.
    pub fn change_cadence_if_needed(&self) -> Result<CadenceChange, CadenceError> {
        let result = evaluate(&self.inner, false);
        self.inner.settle();
        Ok(result?)
    }

    /// Re-evaluates and applies the result even if it is a slow-down.
    ///
    /// # Errors
    ///
    /// As for [`change_cadence_if_needed`](Self::change_cadence_if_needed).
    pub fn force_cadence_change(&self) -> Result<CadenceChange, CadenceError> {
        let result = evaluate(&self.inner, true);
        self.inner.settle();
        Ok(result?)
    }

    /// Notifies the controller that an interactive resize is starting.
    ///
    /// Lets the backend prepare for the resize's nested loop, then
    /// re-evaluates. With the host reporting `live_resizing`, that installs
    /// the active period.
    ///
    /// # Errors
    ///
    /// As for [`change_cadence_if_needed`](Self::change_cadence_if_needed).
    pub fn on_live_resize_begin(&self) -> Result<CadenceChange, CadenceError> {
        {
            let mut s = self.inner.state.borrow_mut();
            if self.inner.stopped(&s) {
                return Ok(CadenceChange::Inactive);
            }
            s.backend.will_start_live_resize();
            let backend = s.backend.kind();
            s.trace(TraceEvent::LiveResize(LiveResizeEvent {
                began: true,
                backend,
            }));
        }
        let result = evaluate(&self.inner, false);
        self.inner.settle();
        Ok(result?)
    }

    /// Notifies the controller that an interactive resize has ended.
    ///
    /// The cached period is reset first, so the evaluation installs the
    /// fresh target immediately instead of deferring a slow-down from the
    /// resize-forced rate. Calling this without a preceding
    /// [`on_live_resize_begin`](Self::on_live_resize_begin) is a plain
    /// re-evaluation.
    ///
    /// # Errors
    ///
    /// As for [`change_cadence_if_needed`](Self::change_cadence_if_needed).
    pub fn on_live_resize_end(&self) -> Result<CadenceChange, CadenceError> {
        {
            let mut s = self.inner.state.borrow_mut();
            if self.inner.stopped(&s) {
                return Ok(CadenceChange::Inactive);
            }
            let backend = s.backend.kind();
            s.trace(TraceEvent::LiveResize(LiveResizeEvent {
                began: false,
                backend,
            }));
            s.live_resize_target = Period::UNSET;
            s.current_period = Period::UNSET;
            s.gate.clear();
        }
        let result = evaluate(&self.inner, false);
        // Without an install, the cache must match the live timer again.
        if !matches!(result, Ok(CadenceChange::Applied { .. })) {
            let mut s = self.inner.state.borrow_mut();
            s.current_period = s.backend.installed_period();
        }
        self.inner.settle();
        Ok(result?)
    }

    /// Cancels the timer and stops all further ticks. Idempotent.
    pub fn teardown(&self) {
        self.inner.teardown();
        self.inner.settle();
    }

    /// Returns `true` if a timer is installed and valid.
    #[must_use]
    pub fn is_timer_valid(&self) -> bool {
        let s = self.inner.state.borrow();
        !self.inner.stopped(&s) && s.backend.is_valid()
    }

    /// Returns the lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> CadencePhase {
        let s = self.inner.state.borrow();
        if self.inner.stopped(&s) {
            CadencePhase::Terminated
        } else if s.backend.is_valid() {
            CadencePhase::Running(s.current_period)
        } else {
            CadencePhase::Uninitialized
        }
    }

    /// Returns the period the installed timer runs at, or [`Period::UNSET`].
    #[must_use]
    pub fn current_period(&self) -> Period {
        self.inner.state.borrow().current_period
    }

    /// Returns the policy target cached during a live resize.
    #[must_use]
    pub fn live_resize_target(&self) -> Option<Period> {
        let target = self.inner.state.borrow().live_resize_target;
        (!target.is_unset()).then_some(target)
    }

    /// Returns `true` if a slow-down is waiting for the next fire.
    #[must_use]
    pub fn deferred_change_pending(&self) -> bool {
        self.inner.state.borrow().gate.is_pending()
    }

    /// Returns the backend kind chosen at construction.
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.inner.state.borrow().backend.kind()
    }

    /// Returns the number of ticks delivered to the delegate.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.inner.state.borrow().tick_count
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> CadenceConfig {
        self.inner.state.borrow().config
    }

    /// Runs `f` with a shared reference to the backend.
    ///
    /// A [`teardown`](Self::teardown) issued from `f` takes effect when `f`
    /// returns.
    pub fn with_backend<R>(&self, f: impl FnOnce(&B) -> R) -> R {
        let r = f(&self.inner.state.borrow().backend);
        self.inner.settle();
        r
    }
}

impl<B: TimerBackend + 'static> Drop for CadenceController<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<B: TimerBackend> Shared<B> {
    fn stopped(&self, s: &State<B>) -> bool {
        s.terminated || self.teardown_requested.get()
    }

    fn teardown(&self) {
        match self.state.try_borrow_mut() {
            Ok(mut s) => s.teardown(),
            Err(_) => self.teardown_requested.set(true),
        }
    }

    /// Carries out a recorded teardown and delivers queued trace events.
    ///
    /// Called once the caller holds no borrow of `state`. A nested call from
    /// inside a sink finds the tracer busy and leaves the queue to the outer
    /// call, which keeps draining until it is empty.
    fn settle(&self) {
        if self.teardown_requested.get()
            && let Ok(mut s) = self.state.try_borrow_mut()
        {
            self.teardown_requested.set(false);
            s.teardown();
        }
        let Ok(mut tracer) = self.tracer.try_borrow_mut() else {
            return;
        };
        loop {
            let batch = match self.state.try_borrow_mut() {
                Ok(mut s) => core::mem::take(&mut s.outbox),
                Err(_) => return,
            };
            if batch.is_empty() {
                return;
            }
            for e in &batch {
                tracer.emit(e);
            }
        }
    }
}

impl<B: TimerBackend> State<B> {
    fn trace(&mut self, e: TraceEvent) {
        if self.tracing {
            self.outbox.push(e);
        }
    }

    fn apply(&mut self, target: &TargetPeriod, force: bool) -> Result<CadenceChange, TimerError> {
        if target.allow_live_resize_override {
            return self.apply_live_resize(target.period);
        }
        self.live_resize_target = Period::UNSET;

        let installed = self.current_period;
        if !self.gate.should_apply_now(target.period, installed, force) {
            self.trace(TraceEvent::Deferred(DeferredEvent {
                installed,
                proposed: target.period,
            }));
            return Ok(CadenceChange::Deferred {
                installed,
                proposed: target.period,
            });
        }
        if target.period == installed && self.backend.is_valid() && !self.live_resize_armed {
            return Ok(CadenceChange::Unchanged);
        }

        if let Err(err) = self.backend.arm(target.period, Rc::clone(&self.fire)) {
            self.current_period = Period::UNSET;
            self.live_resize_armed = false;
            return Err(err);
        }
        self.current_period = target.period;
        self.live_resize_armed = false;
        self.trace(TraceEvent::Applied(AppliedEvent {
            from: installed,
            to: target.period,
            forced: force,
        }));
        Ok(CadenceChange::Applied {
            from: installed,
            to: target.period,
        })
    }

    fn apply_live_resize(&mut self, target: Period) -> Result<CadenceChange, TimerError> {
        self.gate.clear();
        self.live_resize_target = target;
        let forced = self.config.active_period;

        if !self.live_resize_armed || self.current_period != forced || !self.backend.is_valid() {
            let from = self.current_period;
            if let Err(err) = self
                .backend
                .rearm_for_live_resize(forced, Rc::clone(&self.fire))
            {
                self.current_period = Period::UNSET;
                self.live_resize_armed = false;
                return Err(err);
            }
            self.current_period = forced;
            self.live_resize_armed = true;
            self.trace(TraceEvent::Applied(AppliedEvent {
                from,
                to: forced,
                forced: true,
            }));
        }
        self.trace(TraceEvent::LiveResizeOverride(LiveResizeOverrideEvent {
            target,
            forced_period: forced,
        }));
        Ok(CadenceChange::LiveResizeOverride { target, forced })
    }

    /// Cancels the timer without terminating; the owner is gone.
    fn park(&mut self) {
        self.backend.cancel();
        self.gate.clear();
        self.current_period = Period::UNSET;
        self.live_resize_target = Period::UNSET;
        self.live_resize_armed = false;
    }

    fn teardown(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.park();
        self.trace(TraceEvent::Teardown);
    }
}

/// One full evaluation: snapshot, policy, gate, backend.
fn evaluate<B: TimerBackend>(inner: &Shared<B>, force: bool) -> Result<CadenceChange, TimerError> {
    let (delegate, estimator, config) = {
        let mut s = inner.state.borrow_mut();
        if inner.stopped(&s) {
            return Ok(CadenceChange::Inactive);
        }
        let Some(delegate) = s.delegate.upgrade() else {
            s.park();
            return Ok(CadenceChange::Inactive);
        };
        (delegate, Rc::clone(&s.estimator), s.config)
    };

    let snapshot = SignalSnapshot::new(delegate.host_signals(), estimator.estimated_throughput());
    let target = compute_target_period(&snapshot, &config);

    let mut s = inner.state.borrow_mut();
    // The delegate may have torn us down from inside `host_signals`.
    if inner.stopped(&s) {
        return Ok(CadenceChange::Inactive);
    }
    s.trace(TraceEvent::Evaluated(EvaluatedEvent::new(
        &snapshot, &target, force,
    )));
    s.apply(&target, force)
}

fn handle_fire<B: TimerBackend>(weak: &Weak<Shared<B>>, now: HostTime) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    fire(&inner, now);
    inner.settle();
}

fn fire<B: TimerBackend>(inner: &Shared<B>, now: HostTime) {
    let resolve = {
        let Ok(mut s) = inner.state.try_borrow_mut() else {
            return;
        };
        if inner.stopped(&s) {
            return;
        }
        if s.delegate.strong_count() == 0 {
            s.park();
            return;
        }
        s.gate.take_pending()
    };

    if resolve && let Err(error) = evaluate(inner, true) {
        inner
            .state
            .borrow_mut()
            .trace(TraceEvent::TimerFailure(TimerFailureEvent { error }));
    }

    {
        let mut s = inner.state.borrow_mut();
        if inner.stopped(&s) {
            return;
        }
        let tick_index = s.tick_count;
        let period = s.current_period;
        s.trace(TraceEvent::Tick(TickEvent {
            tick_index,
            now,
            period,
            resolved_deferral: resolve,
        }));
    }
    // Sinks see the tick before the delegate does, and may tear down.
    inner.settle();

    let delegate = {
        let mut s = inner.state.borrow_mut();
        if inner.stopped(&s) {
            return;
        }
        let Some(delegate) = s.delegate.upgrade() else {
            s.park();
            return;
        };
        s.tick_count += 1;
        delegate
    };
    delegate.on_tick();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{FixedThroughput, HostSignals};

    // -- Mock backend --------------------------------------------------------

    #[derive(Default)]
    struct MockLog {
        fire: Option<FireCallback>,
        period: Period,
        arms: Vec<Period>,
        resize_arms: Vec<Period>,
        resize_prepared: u32,
        cancels: u32,
        fail_next: Option<TimerError>,
    }

    struct MockBackend {
        kind: BackendKind,
        log: Rc<RefCell<MockLog>>,
    }

    impl MockBackend {
        fn install(&mut self, period: Period, on_fire: FireCallback) -> Result<(), TimerError> {
            let mut log = self.log.borrow_mut();
            log.fire = None;
            log.period = Period::UNSET;
            if period.is_unset() {
                return Err(TimerError::InvalidPeriod);
            }
            if let Some(err) = log.fail_next.take() {
                return Err(err);
            }
            log.fire = Some(on_fire);
            log.period = period;
            Ok(())
        }
    }

    impl TimerBackend for MockBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn arm(&mut self, period: Period, on_fire: FireCallback) -> Result<(), TimerError> {
            self.install(period, on_fire)?;
            self.log.borrow_mut().arms.push(period);
            Ok(())
        }

        fn cancel(&mut self) {
            let mut log = self.log.borrow_mut();
            log.fire = None;
            log.period = Period::UNSET;
            log.cancels += 1;
        }

        fn is_valid(&self) -> bool {
            self.log.borrow().fire.is_some()
        }

        fn installed_period(&self) -> Period {
            self.log.borrow().period
        }

        fn will_start_live_resize(&mut self) {
            self.log.borrow_mut().resize_prepared += 1;
        }

        fn rearm_for_live_resize(
            &mut self,
            active_period: Period,
            on_fire: FireCallback,
        ) -> Result<(), TimerError> {
            self.install(active_period, on_fire)?;
            self.log.borrow_mut().resize_arms.push(active_period);
            Ok(())
        }
    }

    /// Invokes the installed callback, with no borrow of the log held.
    fn fire(log: &Rc<RefCell<MockLog>>, now: u64) -> bool {
        let cb = log.borrow().fire.clone();
        match cb {
            Some(cb) => {
                cb(HostTime(now));
                true
            }
            None => false,
        }
    }

    // -- Owner ---------------------------------------------------------------

    struct Owner {
        signals: Cell<HostSignals>,
        log: Rc<RefCell<MockLog>>,
        /// Installed period observed by each `on_tick`.
        ticks: RefCell<Vec<Period>>,
        controller: RefCell<Option<Weak<CadenceController<MockBackend>>>>,
        force_on_tick: Cell<bool>,
    }

    impl CadenceDelegate for Owner {
        fn host_signals(&self) -> HostSignals {
            self.signals.get()
        }

        fn on_tick(&self) {
            let period = self.log.borrow().period;
            self.ticks.borrow_mut().push(period);
            if self.force_on_tick.get()
                && let Some(controller) = self.controller.borrow().as_ref().and_then(Weak::upgrade)
            {
                let _ = controller.force_cadence_change();
            }
        }
    }

    const CONFIG: CadenceConfig = CadenceConfig::DEFAULT;

    fn visible_active() -> HostSignals {
        HostSignals {
            active: true,
            idle: false,
            visible: true,
            ..HostSignals::default()
        }
    }

    fn adaptive() -> HostSignals {
        HostSignals {
            adaptive_frame_rate_enabled: true,
            adaptive_throughput_threshold: 1_000,
            slow_frame_rate: 30.0,
            ..visible_active()
        }
    }

    struct Fixture {
        owner: Rc<Owner>,
        log: Rc<RefCell<MockLog>>,
        throughput: Rc<Cell<u64>>,
        controller: CadenceController<MockBackend>,
    }

    fn fixture(kind: BackendKind, signals: HostSignals) -> Fixture {
        let log = Rc::new(RefCell::new(MockLog::default()));
        let owner = Rc::new(Owner {
            signals: Cell::new(signals),
            log: Rc::clone(&log),
            ticks: RefCell::new(Vec::new()),
            controller: RefCell::new(None),
            force_on_tick: Cell::new(false),
        });
        let throughput = Rc::new(Cell::new(0_u64));
        let weak_owner = Rc::downgrade(&owner);
        let delegate: Weak<dyn CadenceDelegate> = weak_owner;
        let controller = CadenceController::new(
            MockBackend {
                kind,
                log: Rc::clone(&log),
            },
            delegate,
            Rc::clone(&throughput) as Rc<dyn ThroughputEstimator>,
            CONFIG,
        )
        .unwrap();
        Fixture {
            owner,
            log,
            throughput,
            controller,
        }
    }

    fn fast_target() -> Period {
        CONFIG.fast_period
    }

    fn slow_target() -> Period {
        Period::from_hz(30.0).unwrap()
    }

    // -- Construction --------------------------------------------------------

    #[test]
    fn invalid_config_is_rejected() {
        let owner: Rc<dyn CadenceDelegate> = Rc::new(Owner {
            signals: Cell::new(HostSignals::default()),
            log: Rc::default(),
            ticks: RefCell::new(Vec::new()),
            controller: RefCell::new(None),
            force_on_tick: Cell::new(false),
        });
        let result = CadenceController::new(
            MockBackend {
                kind: BackendKind::Coarse,
                log: Rc::default(),
            },
            Rc::downgrade(&owner),
            Rc::new(FixedThroughput(0)),
            CadenceConfig {
                background_period: Period::from_millis(10),
                ..CONFIG
            },
        );
        assert!(matches!(result, Err(CadenceError::InvalidConfig(_))));
    }

    #[test]
    fn starts_uninitialized_then_runs() {
        let f = fixture(BackendKind::Coarse, visible_active());
        assert_eq!(f.controller.phase(), CadencePhase::Uninitialized);
        assert!(!f.controller.is_timer_valid());

        let change = f.controller.change_cadence_if_needed().unwrap();
        assert_eq!(
            change,
            CadenceChange::Applied {
                from: Period::UNSET,
                to: CONFIG.active_period
            }
        );
        assert_eq!(
            f.controller.phase(),
            CadencePhase::Running(CONFIG.active_period)
        );
        assert!(f.controller.is_timer_valid());
    }

    #[test]
    fn same_target_is_a_no_op() {
        let f = fixture(BackendKind::HighRes, visible_active());
        f.controller.change_cadence_if_needed().unwrap();
        let change = f.controller.change_cadence_if_needed().unwrap();
        assert_eq!(change, CadenceChange::Unchanged);
        assert_eq!(f.log.borrow().arms.len(), 1, "no re-arm for same period");
    }

    // -- Gate ----------------------------------------------------------------

    #[test]
    fn speed_up_applies_immediately() {
        for kind in [BackendKind::Coarse, BackendKind::HighRes] {
            let f = fixture(kind, HostSignals::default());
            f.owner.signals.set(HostSignals {
                visible: true,
                ..HostSignals::default()
            });
            f.controller.change_cadence_if_needed().unwrap();
            assert_eq!(f.controller.current_period(), CONFIG.background_period);

            f.owner.signals.set(visible_active());
            f.controller.change_cadence_if_needed().unwrap();
            assert_eq!(f.controller.current_period(), CONFIG.active_period);
            assert!(!f.controller.deferred_change_pending());
        }
    }

    #[test]
    fn slow_down_is_deferred_until_next_fire() {
        for kind in [BackendKind::Coarse, BackendKind::HighRes] {
            let f = fixture(kind, adaptive());
            f.throughput.set(10);
            f.controller.change_cadence_if_needed().unwrap();
            assert_eq!(f.controller.current_period(), fast_target());

            f.throughput.set(50_000);
            let change = f.controller.change_cadence_if_needed().unwrap();
            assert_eq!(
                change,
                CadenceChange::Deferred {
                    installed: fast_target(),
                    proposed: slow_target()
                }
            );
            assert_eq!(f.controller.current_period(), fast_target());
            assert!(f.controller.deferred_change_pending());

            assert!(fire(&f.log, 1));
            assert_eq!(
                *f.owner.ticks.borrow(),
                [slow_target()],
                "deferral must resolve before on_tick"
            );
            assert_eq!(f.controller.current_period(), slow_target());
            assert!(!f.controller.deferred_change_pending());
        }
    }

    #[test]
    fn force_applies_slow_down_and_clears_pending() {
        let f = fixture(BackendKind::HighRes, adaptive());
        f.throughput.set(10);
        f.controller.change_cadence_if_needed().unwrap();
        f.throughput.set(50_000);
        f.controller.change_cadence_if_needed().unwrap();
        assert!(f.controller.deferred_change_pending());

        f.controller.force_cadence_change().unwrap();
        assert_eq!(f.controller.current_period(), slow_target());
        assert!(!f.controller.deferred_change_pending());
    }

    #[test]
    fn reverting_signals_drop_stale_deferral() {
        let f = fixture(BackendKind::Coarse, adaptive());
        f.throughput.set(10);
        f.controller.change_cadence_if_needed().unwrap();
        f.throughput.set(50_000);
        f.controller.change_cadence_if_needed().unwrap();
        f.throughput.set(10);
        assert_eq!(
            f.controller.change_cadence_if_needed().unwrap(),
            CadenceChange::Unchanged
        );
        assert!(!f.controller.deferred_change_pending());

        assert!(fire(&f.log, 1));
        assert_eq!(f.controller.current_period(), fast_target());
    }

    #[test]
    fn visibility_loss_is_deferred_like_any_slow_down() {
        let f = fixture(
            BackendKind::Coarse,
            HostSignals {
                visible: true,
                ..HostSignals::default()
            },
        );
        f.controller.change_cadence_if_needed().unwrap();
        assert_eq!(f.controller.current_period(), CONFIG.background_period);

        f.owner.signals.set(visible_active());
        assert_eq!(
            f.controller.change_cadence_if_needed().unwrap(),
            CadenceChange::Applied {
                from: CONFIG.background_period,
                to: CONFIG.active_period
            }
        );

        f.owner.signals.set(HostSignals {
            visible: false,
            ..visible_active()
        });
        assert!(matches!(
            f.controller.change_cadence_if_needed().unwrap(),
            CadenceChange::Deferred { .. }
        ));
        assert_eq!(f.controller.current_period(), CONFIG.active_period);

        assert!(fire(&f.log, 1));
        assert_eq!(f.controller.current_period(), CONFIG.background_period);
        assert_eq!(f.owner.ticks.borrow().len(), 1);
    }

    // -- Live resize ---------------------------------------------------------

    #[test]
    fn live_resize_forces_active_period_and_caches_target() {
        for kind in [BackendKind::Coarse, BackendKind::HighRes] {
            let f = fixture(kind, adaptive());
            f.throughput.set(10);
            f.controller.change_cadence_if_needed().unwrap();

            f.owner.signals.set(HostSignals {
                live_resizing: true,
                ..adaptive()
            });
            let change = f.controller.on_live_resize_begin().unwrap();
            assert_eq!(
                change,
                CadenceChange::LiveResizeOverride {
                    target: fast_target(),
                    forced: CONFIG.active_period
                }
            );
            assert_eq!(f.log.borrow().resize_prepared, 1);
            assert_eq!(f.controller.live_resize_target(), Some(fast_target()));

            // Target changes during the resize do not touch the timer.
            f.throughput.set(50_000);
            f.controller.change_cadence_if_needed().unwrap();
            for now in 1..=3 {
                assert!(fire(&f.log, now));
            }
            assert_eq!(*f.owner.ticks.borrow(), [CONFIG.active_period; 3]);
            assert_eq!(f.controller.live_resize_target(), Some(slow_target()));
            assert_eq!(f.log.borrow().resize_arms.len(), 1);

            f.owner.signals.set(adaptive());
            let change = f.controller.on_live_resize_end().unwrap();
            assert_eq!(
                change,
                CadenceChange::Applied {
                    from: Period::UNSET,
                    to: slow_target()
                },
                "slow-down after resize is not deferred"
            );
            assert_eq!(f.controller.current_period(), slow_target());
            assert_eq!(f.controller.live_resize_target(), None);
        }
    }

    #[test]
    fn live_resize_end_rearms_even_at_the_forced_period() {
        let f = fixture(
            BackendKind::Coarse,
            HostSignals {
                live_resizing: true,
                ..visible_active()
            },
        );
        f.controller.on_live_resize_begin().unwrap();
        f.owner.signals.set(visible_active());
        let change = f.controller.on_live_resize_end().unwrap();
        assert_eq!(
            change,
            CadenceChange::Applied {
                from: Period::UNSET,
                to: CONFIG.active_period
            }
        );
        assert_eq!(f.log.borrow().arms, [CONFIG.active_period]);
    }

    #[test]
    fn live_resize_end_without_begin_is_plain_evaluation() {
        let f = fixture(BackendKind::HighRes, visible_active());
        let change = f.controller.on_live_resize_end().unwrap();
        assert_eq!(
            change,
            CadenceChange::Applied {
                from: Period::UNSET,
                to: CONFIG.active_period
            }
        );
        assert_eq!(f.log.borrow().resize_prepared, 0);
    }

    // -- Teardown ------------------------------------------------------------

    #[test]
    fn teardown_cancels_and_silences_scheduled_fires() {
        let f = fixture(BackendKind::Coarse, visible_active());
        f.controller.change_cadence_if_needed().unwrap();
        let stale = f.log.borrow().fire.clone().unwrap();

        f.controller.teardown();
        assert_eq!(f.controller.phase(), CadencePhase::Terminated);
        assert!(!f.controller.is_timer_valid());
        assert_eq!(f.log.borrow().cancels, 1);

        for now in 0..10 {
            stale(HostTime(now));
        }
        assert!(f.owner.ticks.borrow().is_empty());

        f.controller.teardown();
        assert_eq!(f.log.borrow().cancels, 1, "teardown is idempotent");
        assert_eq!(
            f.controller.change_cadence_if_needed().unwrap(),
            CadenceChange::Inactive
        );
        assert_eq!(
            f.controller.on_live_resize_begin().unwrap(),
            CadenceChange::Inactive
        );
        assert!(f.log.borrow().fire.is_none(), "no timer after teardown");
    }

    #[test]
    fn drop_cancels_timer() {
        let f = fixture(BackendKind::HighRes, visible_active());
        f.controller.change_cadence_if_needed().unwrap();
        let stale = f.log.borrow().fire.clone().unwrap();
        let Fixture {
            owner,
            log,
            controller,
            ..
        } = f;
        drop(controller);
        assert_eq!(log.borrow().cancels, 1);
        stale(HostTime(1));
        assert!(owner.ticks.borrow().is_empty());
    }

    #[test]
    fn dropped_delegate_stops_evaluations_and_ticks() {
        let f = fixture(BackendKind::Coarse, visible_active());
        f.controller.change_cadence_if_needed().unwrap();
        let Fixture {
            owner,
            log,
            controller,
            ..
        } = f;
        drop(owner);
        assert_eq!(
            controller.change_cadence_if_needed().unwrap(),
            CadenceChange::Inactive
        );
        assert_eq!(log.borrow().cancels, 1);
        assert!(!controller.is_timer_valid());
        assert_eq!(controller.phase(), CadencePhase::Uninitialized);
        assert!(!fire(&log, 1));
        assert_eq!(controller.tick_count(), 0);
    }

    #[test]
    fn dropped_delegate_cancels_timer_on_next_fire() {
        let f = fixture(BackendKind::HighRes, visible_active());
        f.controller.change_cadence_if_needed().unwrap();
        let Fixture {
            owner,
            log,
            controller,
            ..
        } = f;
        let cb = log.borrow().fire.clone().unwrap();
        drop(owner);

        cb(HostTime(1));
        assert_eq!(log.borrow().cancels, 1);
        assert!(!controller.is_timer_valid());
        assert_eq!(controller.phase(), CadencePhase::Uninitialized);
        assert_eq!(controller.tick_count(), 0);

        cb(HostTime(2));
        assert_eq!(log.borrow().cancels, 2, "a stale fire cancels again");
        assert_eq!(controller.tick_count(), 0);
    }

    #[test]
    fn teardown_inside_with_backend_takes_effect_after() {
        let f = fixture(BackendKind::Coarse, visible_active());
        f.controller.change_cadence_if_needed().unwrap();
        let cb = f.log.borrow().fire.clone().unwrap();

        f.controller.with_backend(|_| {
            f.controller.teardown();
            assert_eq!(f.controller.phase(), CadencePhase::Terminated);
            assert!(!f.controller.is_timer_valid());
        });
        assert_eq!(f.log.borrow().cancels, 1);
        assert!(f.log.borrow().fire.is_none());

        cb(HostTime(1));
        assert!(f.owner.ticks.borrow().is_empty());
        assert_eq!(f.controller.change_cadence_if_needed(), Ok(CadenceChange::Inactive));
        assert_eq!(f.log.borrow().arms.len(), 1);
    }

    // -- Fire path -----------------------------------------------------------

    #[test]
    fn on_tick_may_reenter_controller() {
        let log = Rc::new(RefCell::new(MockLog::default()));
        let owner = Rc::new(Owner {
            signals: Cell::new(visible_active()),
            log: Rc::clone(&log),
            ticks: RefCell::new(Vec::new()),
            controller: RefCell::new(None),
            force_on_tick: Cell::new(true),
        });
        let weak_owner = Rc::downgrade(&owner);
        let delegate: Weak<dyn CadenceDelegate> = weak_owner;
        let controller = Rc::new(
            CadenceController::new(
                MockBackend {
                    kind: BackendKind::HighRes,
                    log: Rc::clone(&log),
                },
                delegate,
                Rc::new(FixedThroughput(0)),
                CONFIG,
            )
            .unwrap(),
        );
        owner
            .controller
            .replace(Some(Rc::downgrade(&controller)));

        controller.change_cadence_if_needed().unwrap();
        owner.signals.set(HostSignals {
            visible: false,
            ..visible_active()
        });
        assert!(fire(&log, 1));
        assert_eq!(controller.tick_count(), 1);
        assert_eq!(controller.current_period(), CONFIG.background_period);
    }

    #[test]
    fn arm_failure_propagates_to_caller() {
        let f = fixture(BackendKind::Coarse, visible_active());
        f.log.borrow_mut().fail_next = Some(TimerError::LoopUnavailable);
        assert_eq!(
            f.controller.change_cadence_if_needed(),
            Err(CadenceError::Timer(TimerError::LoopUnavailable))
        );
        assert_eq!(f.controller.phase(), CadencePhase::Uninitialized);

        // A later evaluation recovers.
        f.controller.change_cadence_if_needed().unwrap();
        assert!(f.controller.is_timer_valid());
    }

    #[test]
    fn failure_while_resolving_still_delivers_tick() {
        let f = fixture(BackendKind::HighRes, adaptive());
        f.throughput.set(10);
        f.controller.change_cadence_if_needed().unwrap();
        f.throughput.set(50_000);
        f.controller.change_cadence_if_needed().unwrap();

        let cb = f.log.borrow().fire.clone().unwrap();
        f.log.borrow_mut().fail_next = Some(TimerError::LoopUnavailable);
        cb(HostTime(1));
        assert_eq!(f.controller.tick_count(), 1);
        assert!(!f.controller.is_timer_valid());
    }

    #[test]
    fn tick_count_counts_delivered_ticks() {
        let f = fixture(BackendKind::Coarse, visible_active());
        f.controller.change_cadence_if_needed().unwrap();
        for now in 1..=5 {
            assert!(fire(&f.log, now));
        }
        assert_eq!(f.controller.tick_count(), 5);
        assert_eq!(f.owner.ticks.borrow().len(), 5);
    }

    #[test]
    fn error_display() {
        let err = CadenceError::from(TimerError::InvalidPeriod);
        assert_eq!(
            alloc::format!("{err}"),
            "timer backend failed: timer period must be non-zero"
        );
    }

    #[cfg(feature = "trace")]
    #[test]
    fn trace_records_deferral_and_resolution() {
        #[derive(Default)]
        struct Sink {
            deferred: u32,
            applied: Vec<(Period, bool)>,
            ticks: Vec<(u64, bool)>,
            teardowns: u32,
        }
        impl TraceSink for Sink {
            fn on_deferred(&mut self, _e: &DeferredEvent) {
                self.deferred += 1;
            }
            fn on_applied(&mut self, e: &AppliedEvent) {
                self.applied.push((e.to, e.forced));
            }
            fn on_tick(&mut self, e: &TickEvent) {
                self.ticks.push((e.now.nanos(), e.resolved_deferral));
            }
            fn on_teardown(&mut self) {
                self.teardowns += 1;
            }
        }

        let f = fixture(BackendKind::HighRes, adaptive());
        let sink = Rc::new(RefCell::new(Sink::default()));
        f.controller.set_trace_sink(Box::new(Rc::clone(&sink)));

        f.throughput.set(10);
        f.controller.change_cadence_if_needed().unwrap();
        f.throughput.set(50_000);
        f.controller.change_cadence_if_needed().unwrap();
        assert!(fire(&f.log, 42));
        f.controller.teardown();

        let sink = sink.borrow();
        assert_eq!(sink.deferred, 1);
        assert_eq!(sink.applied, [(fast_target(), false), (slow_target(), true)]);
        assert_eq!(sink.ticks, [(42, true)]);
        assert_eq!(sink.teardowns, 1);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn sink_may_tear_down_from_on_tick() {
        struct Sink {
            controller: Weak<CadenceController<MockBackend>>,
            phases: Vec<CadencePhase>,
            ticks: u32,
            teardowns: u32,
        }
        impl TraceSink for Sink {
            fn on_tick(&mut self, _e: &TickEvent) {
                self.ticks += 1;
                if let Some(controller) = self.controller.upgrade() {
                    self.phases.push(controller.phase());
                    assert_eq!(controller.tick_count(), 0);
                    controller.teardown();
                    self.phases.push(controller.phase());
                }
            }
            fn on_teardown(&mut self) {
                self.teardowns += 1;
            }
        }

        let Fixture {
            owner,
            log,
            controller,
            ..
        } = fixture(BackendKind::HighRes, visible_active());
        let controller = Rc::new(controller);
        controller.change_cadence_if_needed().unwrap();
        let installed = controller.current_period();
        let sink = Rc::new(RefCell::new(Sink {
            controller: Rc::downgrade(&controller),
            phases: Vec::new(),
            ticks: 0,
            teardowns: 0,
        }));
        controller.set_trace_sink(Box::new(Rc::clone(&sink)));

        // The loop may already hold the callback when the timer is cancelled.
        let cb = log.borrow().fire.clone().unwrap();
        for now in 1..=3 {
            cb(HostTime(now));
        }

        assert_eq!(controller.phase(), CadencePhase::Terminated);
        assert_eq!(log.borrow().cancels, 1);
        assert_eq!(controller.tick_count(), 0);
        assert!(owner.ticks.borrow().is_empty());
        let sink = sink.borrow();
        assert_eq!(sink.ticks, 1);
        assert_eq!(sink.teardowns, 1);
        assert_eq!(
            sink.phases,
            [CadencePhase::Running(installed), CadencePhase::Terminated]
        );
    }
}
