// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-threaded, mode-aware run loop.
//!
//! A [`RunLoop`] is the one designated execution context: every timer
//! callback and every controller call happens on the thread that runs it.
//! The handle is reference counted and `!Send`.
//!
//! # Modes
//!
//! The loop always runs in exactly one [`RunLoopMode`]. A timer source is
//! registered for a [`ModeSet`] and only fires while the innermost running
//! loop is in one of those modes. An interactive resize runs a nested loop
//! in [`RunLoopMode::EventTracking`], so a source registered only for
//! [`RunLoopMode::Default`] silently stops firing until the resize ends.
//!
//! ```text
//!   run_until(Default, t1)
//!     └─ callback ─► run_until(EventTracking, t2)   // nested resize loop
//!                        fires only EVENT_TRACKING / COMMON sources
//! ```
//!
//! # Firing rules
//!
//! - No internal borrow is held while a callback runs. Callbacks may add,
//!   remove, or re-arm sources and may run a nested loop.
//! - A source removed by an earlier callback in the same batch does not
//!   fire.
//! - Missed fires are skipped: after a late fire the next one is the next
//!   period boundary after the current time.
//! - A source with leeway `L` due at `t` fires somewhere in `[t, t + L]`.
//!   The loop sleeps until the earliest latest-allowed time of any eligible
//!   source and then fires everything already due.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::BitOr;
use std::rc::{Rc, Weak};

use cadence_core::backend::FireCallback;
use cadence_core::time::{HostTime, Period};
use hashbrown::HashMap;

use crate::clock::Clock;

/// A run loop mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunLoopMode {
    /// The normal mode.
    Default,
    /// The mode an interactive resize or drag runs its nested loop in.
    EventTracking,
}

impl RunLoopMode {
    const fn bit(self) -> u8 {
        match self {
            Self::Default => 0b01,
            Self::EventTracking => 0b10,
        }
    }
}

/// A set of [`RunLoopMode`]s a source is registered for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModeSet(u8);

impl ModeSet {
    /// No modes.
    pub const EMPTY: Self = Self(0);
    /// [`RunLoopMode::Default`] only.
    pub const DEFAULT: Self = Self(RunLoopMode::Default.bit());
    /// [`RunLoopMode::EventTracking`] only.
    pub const EVENT_TRACKING: Self = Self(RunLoopMode::EventTracking.bit());
    /// Every mode.
    pub const COMMON: Self = Self(Self::DEFAULT.0 | Self::EVENT_TRACKING.0);

    /// Returns `true` if `mode` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, mode: RunLoopMode) -> bool {
        self.0 & mode.bit() != 0
    }

    /// Returns the union of both sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for ModeSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl From<RunLoopMode> for ModeSet {
    fn from(mode: RunLoopMode) -> Self {
        Self(mode.bit())
    }
}

impl fmt::Debug for ModeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        if self.contains(RunLoopMode::Default) {
            set.entry(&RunLoopMode::Default);
        }
        if self.contains(RunLoopMode::EventTracking) {
            set.entry(&RunLoopMode::EventTracking);
        }
        set.finish()
    }
}

/// Identifies a timer source within one run loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

/// Parameters of a repeating timer source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerSpec {
    /// First fire time.
    pub first_fire: HostTime,
    /// Repeat period. Must be non-zero.
    pub period: Period,
    /// How late a fire may be delivered to coalesce wake-ups.
    pub leeway: Period,
    /// Modes the source fires in.
    pub modes: ModeSet,
}

struct Source {
    modes: ModeSet,
    period: Period,
    leeway: Period,
    next_fire: HostTime,
    callback: FireCallback,
}

impl Source {
    fn latest_fire(&self) -> HostTime {
        self.next_fire.saturating_add(self.leeway)
    }

    /// Moves `next_fire` to the first period boundary after `now`.
    fn advance_past(&mut self, now: HostTime) {
        let period = self.period.as_nanos().max(1);
        let late = now.saturating_duration_since(self.next_fire).as_nanos();
        let skipped = late / period + 1;
        self.next_fire = self
            .next_fire
            .saturating_add(Period(skipped.saturating_mul(period)));
    }
}

struct Inner {
    clock: Rc<dyn Clock>,
    sources: RefCell<HashMap<SourceId, Source>>,
    next_id: Cell<u64>,
    modes: RefCell<Vec<RunLoopMode>>,
    stop_requested: Cell<bool>,
    fires: Cell<u64>,
}

/// A reference-counted handle to a single-threaded run loop.
///
/// Cloning the handle shares the loop.
#[derive(Clone)]
pub struct RunLoop {
    inner: Rc<Inner>,
}

/// A non-owning handle to a [`RunLoop`].
#[derive(Clone, Default)]
pub struct WeakRunLoop {
    inner: Weak<Inner>,
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoop")
            .field("now", &self.now())
            .field("sources", &self.source_count())
            .field("mode", &self.current_mode())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for WeakRunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRunLoop")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl WeakRunLoop {
    /// Returns the loop if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<RunLoop> {
        self.inner.upgrade().map(|inner| RunLoop { inner })
    }
}

impl RunLoop {
    /// Creates an idle loop on `clock`.
    #[must_use]
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(Inner {
                clock,
                sources: RefCell::new(HashMap::new()),
                next_id: Cell::new(0),
                modes: RefCell::new(Vec::new()),
                stop_requested: Cell::new(false),
                fires: Cell::new(0),
            }),
        }
    }

    /// Returns a non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakRunLoop {
        WeakRunLoop {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns the loop clock's current time.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.inner.clock.now()
    }

    /// Returns the mode of the innermost running loop, if any.
    #[must_use]
    pub fn current_mode(&self) -> Option<RunLoopMode> {
        self.inner.modes.borrow().last().copied()
    }

    /// Returns how many loop invocations are on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.modes.borrow().len()
    }

    /// Returns the total number of callbacks fired so far.
    #[must_use]
    pub fn total_fires(&self) -> u64 {
        self.inner.fires.get()
    }

    /// Registers a repeating timer source.
    pub fn add_timer(&self, spec: TimerSpec, callback: FireCallback) -> SourceId {
        let id = SourceId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.sources.borrow_mut().insert(
            id,
            Source {
                modes: spec.modes,
                period: spec.period,
                leeway: spec.leeway,
                next_fire: spec.first_fire,
                callback,
            },
        );
        id
    }

    /// Removes a source. Returns `false` if it was not registered.
    ///
    /// A removed source never fires again, even if it is part of the batch
    /// currently being delivered.
    pub fn remove(&self, id: SourceId) -> bool {
        self.inner.sources.borrow_mut().remove(&id).is_some()
    }

    /// Registers an existing source for additional modes.
    ///
    /// Returns `false` if the source is not registered.
    pub fn add_modes(&self, id: SourceId, modes: ModeSet) -> bool {
        match self.inner.sources.borrow_mut().get_mut(&id) {
            Some(source) => {
                source.modes = source.modes | modes;
                true
            }
            None => false,
        }
    }

    /// Returns the modes a source fires in.
    #[must_use]
    pub fn modes(&self, id: SourceId) -> Option<ModeSet> {
        self.inner.sources.borrow().get(&id).map(|s| s.modes)
    }

    /// Returns the next scheduled fire of a source.
    #[must_use]
    pub fn next_fire(&self, id: SourceId) -> Option<HostTime> {
        self.inner.sources.borrow().get(&id).map(|s| s.next_fire)
    }

    /// Returns `true` if the source is registered.
    #[must_use]
    pub fn contains(&self, id: SourceId) -> bool {
        self.inner.sources.borrow().contains_key(&id)
    }

    /// Returns the number of registered sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.inner.sources.borrow().len()
    }

    /// Asks the innermost running loop to return after its current batch.
    pub fn stop(&self) {
        if self.depth() > 0 {
            self.inner.stop_requested.set(true);
        }
    }

    /// Runs the loop in `mode` for `duration` from now.
    pub fn run_for(&self, mode: RunLoopMode, duration: Period) -> usize {
        self.run_until(mode, self.now().saturating_add(duration))
    }

    /// Runs the loop in `mode` until `deadline` or [`stop`](Self::stop).
    ///
    /// Returns the number of callbacks fired by this invocation, including
    /// fires from nested loops started inside callbacks. Sources due exactly
    /// at `deadline` fire before the loop returns.
    pub fn run_until(&self, mode: RunLoopMode, deadline: HostTime) -> usize {
        self.inner.modes.borrow_mut().push(mode);
        let start = self.inner.fires.get();

        loop {
            if self.inner.stop_requested.replace(false) {
                break;
            }
            let now = self.now();
            let due = self.due_sources(mode, now);
            if !due.is_empty() {
                for id in due {
                    self.fire(id, mode, now);
                }
                continue;
            }
            if now >= deadline {
                break;
            }
            let wake = self.next_wake(mode).map_or(deadline, |t| t.min(deadline));
            self.inner.clock.wait_until(wake);
        }

        self.inner.modes.borrow_mut().pop();
        let fired = self.inner.fires.get() - start;
        usize::try_from(fired).unwrap_or(usize::MAX)
    }

    /// Sources eligible in `mode` with `next_fire <= now`, oldest first.
    fn due_sources(&self, mode: RunLoopMode, now: HostTime) -> Vec<SourceId> {
        let sources = self.inner.sources.borrow();
        let mut due: Vec<(HostTime, SourceId)> = sources
            .iter()
            .filter(|(_, s)| s.modes.contains(mode) && s.next_fire <= now)
            .map(|(id, s)| (s.next_fire, *id))
            .collect();
        due.sort_unstable();
        due.into_iter().map(|(_, id)| id).collect()
    }

    fn next_wake(&self, mode: RunLoopMode) -> Option<HostTime> {
        self.inner
            .sources
            .borrow()
            .values()
            .filter(|s| s.modes.contains(mode))
            .map(Source::latest_fire)
            .min()
    }

    fn fire(&self, id: SourceId, mode: RunLoopMode, now: HostTime) {
        let callback = {
            let mut sources = self.inner.sources.borrow_mut();
            let Some(source) = sources.get_mut(&id) else {
                return;
            };
            // Re-armed or re-moded by an earlier callback in this batch.
            if !source.modes.contains(mode) || source.next_fire > now {
                return;
            }
            source.advance_past(now);
            Rc::clone(&source.callback)
        };
        self.inner.fires.set(self.inner.fires.get() + 1);
        callback(now);
    }
}
