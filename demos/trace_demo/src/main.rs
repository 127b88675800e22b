// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated session that exercises the cadence controller and the
//! diagnostics pipeline.
//!
//! For each timer backend, drives a controller on a [`ManualClock`] through
//! a scripted session: a background start, user activity, adaptive mode with
//! falling and rising throughput, a live resize with its nested tracking
//! loop, and finally the window being hidden. Events go to a
//! [`PrettyPrintSink`], a [`CadenceHistogram`], and a [`RecorderSink`] whose
//! bytes are exported as a Chrome trace per backend.

use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::rc::{Rc, Weak};

use cadence_core::backend::BackendKind;
use cadence_core::controller::{CadenceChange, CadenceController};
use cadence_core::policy::CadenceConfig;
use cadence_core::signal::{CadenceDelegate, HostSignals, ThroughputEstimator};
use cadence_core::time::{HostTime, Period};
use cadence_debug::FanOut;
use cadence_debug::histogram::CadenceHistogram;
use cadence_debug::pretty::PrettyPrintSink;
use cadence_debug::recorder::RecorderSink;
use cadence_runloop::{Clock, LoopBackend, ManualClock, RunLoop, RunLoopMode, cadence_controller};

/// Start the clock at 1s so timestamps are never zero.
const START: HostTime = HostTime(1_000_000_000);

/// The simulated window.
#[derive(Debug, Default)]
struct Window {
    signals: Cell<HostSignals>,
    redraws: Cell<u64>,
}

impl Window {
    fn update(&self, f: impl FnOnce(&mut HostSignals)) {
        let mut signals = self.signals.get();
        f(&mut signals);
        self.signals.set(signals);
    }
}

impl CadenceDelegate for Window {
    fn host_signals(&self) -> HostSignals {
        self.signals.get()
    }

    fn on_tick(&self) {
        self.redraws.set(self.redraws.get() + 1);
    }
}

/// Throughput the demo script sets directly.
#[derive(Debug, Default)]
struct ScriptedThroughput(Cell<u64>);

impl ThroughputEstimator for ScriptedThroughput {
    fn estimated_throughput(&self) -> u64 {
        self.0.get()
    }
}

struct Session {
    clock: Rc<ManualClock>,
    run_loop: RunLoop,
    window: Rc<Window>,
    throughput: Rc<ScriptedThroughput>,
    controller: CadenceController<LoopBackend>,
}

impl Session {
    fn new(
        kind: BackendKind,
        clock: Rc<ManualClock>,
        sink: FanOut,
    ) -> Result<Self, Box<dyn Error>> {
        let run_loop = RunLoop::new(Rc::clone(&clock) as Rc<dyn Clock>);
        let window = Rc::new(Window::default());
        window.update(|s| s.visible = true);
        let throughput = Rc::new(ScriptedThroughput::default());

        let weak_window = Rc::downgrade(&window);
        let delegate: Weak<dyn CadenceDelegate> = weak_window;
        let estimator: Rc<dyn ThroughputEstimator> = Rc::clone(&throughput) as _;
        let controller = cadence_controller(
            &run_loop,
            kind,
            delegate,
            estimator,
            CadenceConfig::DEFAULT,
        )?;
        controller.set_trace_sink(Box::new(sink));

        Ok(Self {
            clock,
            run_loop,
            window,
            throughput,
            controller,
        })
    }

    fn step(&self, label: &str, change: CadenceChange) {
        println!(
            "-- {label}: {change:?} at {:.1}ms, installed {}",
            self.clock.now().nanos() as f64 / 1_000_000.0,
            self.controller.current_period(),
        );
    }

    fn run(&self, mode: RunLoopMode, millis: u64) {
        self.run_loop.run_for(mode, Period::from_millis(millis));
    }

    fn play(&self) -> Result<(), Box<dyn Error>> {
        self.step("start", self.controller.change_cadence_if_needed()?);
        self.run(RunLoopMode::Default, 2_100);

        self.window.update(|s| s.active = true);
        self.step("activity", self.controller.change_cadence_if_needed()?);
        self.run(RunLoopMode::Default, 300);

        self.window.update(|s| {
            s.adaptive_frame_rate_enabled = true;
            s.slow_frame_rate = 10.0;
        });
        self.throughput.0.set(2_000);
        self.step("adaptive, light load", self.controller.change_cadence_if_needed()?);
        self.run(RunLoopMode::Default, 200);

        self.throughput.0.set(50_000);
        self.step("adaptive, heavy load", self.controller.change_cadence_if_needed()?);
        self.run(RunLoopMode::Default, 400);

        self.window.update(|s| s.live_resizing = true);
        self.step("resize begin", self.controller.on_live_resize_begin()?);
        // The resize drives its own nested loop in tracking mode.
        self.run(RunLoopMode::EventTracking, 500);
        self.window.update(|s| s.live_resizing = false);
        self.step("resize end", self.controller.on_live_resize_end()?);
        self.run(RunLoopMode::Default, 400);

        self.window.update(|s| {
            s.visible = false;
            s.active = false;
        });
        self.step("hidden", self.controller.change_cadence_if_needed()?);
        self.run(RunLoopMode::Default, 3_000);

        self.controller.teardown();
        println!(
            "-- done: {} redraws, {} loop fires",
            self.window.redraws.get(),
            self.run_loop.total_fires(),
        );
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    for (kind, name) in [
        (BackendKind::Coarse, "coarse"),
        (BackendKind::HighRes, "high_res"),
    ] {
        println!("== {name} backend ==");

        let clock = Rc::new(ManualClock::new(START));
        let histogram = Rc::new(RefCell::new(CadenceHistogram::new()));
        let stamp = Rc::clone(&clock);
        let recorder = Rc::new(RefCell::new(RecorderSink::with_clock(move || stamp.now())));
        let sink = FanOut::new()
            .with(PrettyPrintSink::new(Box::new(std::io::stdout())).without_ticks())
            .with(Rc::clone(&histogram))
            .with(Rc::clone(&recorder));

        let session = Session::new(kind, clock, sink)?;
        session.play()?;

        histogram.borrow().write_json(&mut std::io::stdout())?;

        let path = format!("cadence_trace_{name}.json");
        let mut writer = BufWriter::new(File::create(&path)?);
        cadence_debug::chrome::export(recorder.borrow().as_bytes(), &mut writer)?;
        println!("Wrote {path}");
    }
    Ok(())
}
