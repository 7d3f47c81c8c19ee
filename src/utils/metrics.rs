use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::crawler::task::Readiness;

/// Counters for one harvest run
#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    /// Start time of the run
    pub start_time: DateTime<Utc>,

    /// Pages that rendered fully
    pub ready: usize,

    /// Pages read after a failed expansion step
    pub degraded: usize,

    /// Pages whose key markers never appeared
    pub timed_out: usize,

    /// Tasks that produced no record
    pub failed: usize,

    /// Task durations in milliseconds, completed tasks only
    pub task_durations: Vec<u64>,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            ready: 0,
            degraded: 0,
            timed_out: 0,
            failed: 0,
            task_durations: Vec::new(),
        }
    }

    /// Record a completed task
    pub fn record_completion(&mut self, readiness: Readiness, duration_ms: u64) {
        match readiness {
            Readiness::Ready => self.ready += 1,
            Readiness::Degraded => self.degraded += 1,
            Readiness::TimedOut => self.timed_out += 1,
        }
        self.task_durations.push(duration_ms);
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Mean duration of completed tasks
    pub fn mean_duration_ms(&self) -> u64 {
        if self.task_durations.is_empty() {
            return 0;
        }
        self.task_durations.iter().sum::<u64>() / self.task_durations.len() as u64
    }

    /// Seconds since the run started
    pub fn elapsed_secs(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}

/// Timer for measuring task durations
pub struct TaskTimer {
    start: Instant,
}

impl TaskTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time in milliseconds
    pub fn end(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
