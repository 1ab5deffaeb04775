// Geiger MQTT: Periodic Task Scheduler
//
// A fixed table of interval tasks polled from the main loop.  Each entry is
// {callback, interval, running, last fire}; `update` fires a running task
// once its interval has elapsed and restarts the interval from `now`.
// Cooperative and single-threaded: a callback that blocks stalls every task.

use core::ops::ControlFlow;
use std::time::{Duration, Instant};

/// Task body.  Returning `Break` stops the task (one-shot behaviour).
pub type Callback<C> = fn(&mut C) -> ControlFlow<()>;

pub struct PeriodicTask<C> {
    callback: Callback<C>,
    interval: Duration,
    running: bool,
    last_fire: Instant,
}

impl<C> PeriodicTask<C> {
    pub fn new(callback: Callback<C>, interval: Duration, now: Instant) -> Self {
        Self {
            callback,
            interval,
            running: false,
            last_fire: now,
        }
    }

    /// Start (or restart) the task; the first fire is one full interval away.
    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.last_fire = now;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fire the callback if running and due.  Returns whether it fired.
    pub fn update(&mut self, now: Instant, ctx: &mut C) -> bool {
        if !self.running {
            return false;
        }
        if now.saturating_duration_since(self.last_fire) < self.interval {
            return false;
        }

        self.last_fire = now;
        if (self.callback)(ctx).is_break() {
            self.running = false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Task table
// ---------------------------------------------------------------------------

/// The firmware's fixed task set, in update order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskId {
    /// Window rotation + display + telemetry reading (10 s).
    Counts,
    /// Silences the piezo after a chirp (100 ms, one-shot).
    ChirpOff,
    /// Republishes the discovery payload (hourly).
    ConfigRepublish,
}

impl TaskId {
    pub const ALL: [TaskId; 3] = [TaskId::Counts, TaskId::ChirpOff, TaskId::ConfigRepublish];

    const fn index(self) -> usize {
        self as usize
    }
}

pub struct Scheduler<C> {
    tasks: [PeriodicTask<C>; 3],
}

impl<C> Scheduler<C> {
    pub fn new(
        counts: PeriodicTask<C>,
        chirp_off: PeriodicTask<C>,
        config_republish: PeriodicTask<C>,
    ) -> Self {
        Self {
            tasks: [counts, chirp_off, config_republish],
        }
    }

    pub fn start(&mut self, id: TaskId, now: Instant) {
        self.tasks[id.index()].start(now);
    }

    pub fn stop(&mut self, id: TaskId) {
        self.tasks[id.index()].stop();
    }

    pub fn is_running(&self, id: TaskId) -> bool {
        self.tasks[id.index()].is_running()
    }

    pub fn task(&self, id: TaskId) -> &PeriodicTask<C> {
        &self.tasks[id.index()]
    }

    /// Poll every task once, in `TaskId::ALL` order.  Returns how many fired.
    pub fn update(&mut self, now: Instant, ctx: &mut C) -> usize {
        self.tasks
            .iter_mut()
            .map(|task| task.update(now, ctx))
            .filter(|fired| *fired)
            .count()
    }
}
