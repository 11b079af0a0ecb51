//! Accumulating wall-clock timer for phase profiling.

use std::time::{Duration, Instant};

/// Records the duration of repeated start/stop intervals.
///
/// The PnR session keeps one timer for constraint building and one for
/// solving. Timers are advisory: nothing in the pipeline depends on them for
/// correctness, but the optimizer may consult elapsed time for its budget.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    started: Option<Instant>,
    times: Vec<Duration>,
}

impl Timer {
    /// Creates a stopped timer with no recorded intervals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new interval. Restarting a running timer discards the open interval.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Stops the running interval and records it. Does nothing if stopped.
    pub fn stop(&mut self) {
        if let Some(start) = self.started.take() {
            self.times.push(start.elapsed());
        }
    }

    /// Runs `f` inside one recorded interval.
    pub fn time<T>(&mut self, f: impl FnOnce() -> T) -> T {
        self.start();
        let out = f();
        self.stop();
        out
    }

    /// Returns `true` while an interval is open.
    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Returns every recorded interval in order.
    pub fn times(&self) -> &[Duration] {
        &self.times
    }

    /// Returns the sum of all recorded intervals.
    pub fn total(&self) -> Duration {
        self.times.iter().sum()
    }
}
