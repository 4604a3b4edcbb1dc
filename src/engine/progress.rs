//! Throughput telemetry

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Local};

/// Timestamp layout used in log lines
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One progress line
#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub timestamp: DateTime<Local>,
    /// Batches evaluated so far
    pub completed: usize,
    /// Batches planned for the run
    pub total: usize,
    pub examples_per_sec: f64,
    pub sec_per_batch: f64,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: [{}/{} batches] ({:.1} examples/sec; {:.3} sec/batch)",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.completed,
            self.total,
            self.examples_per_sec,
            self.sec_per_batch
        )
    }
}

/// Measures throughput over windows of a fixed number of batches
#[derive(Debug, Clone)]
pub struct ProgressMeter {
    every: usize,
    batch_size: usize,
    total: usize,
    window_start: Instant,
}

impl ProgressMeter {
    /// Create a meter reporting every `every` batches; the window starts now
    pub fn new(every: usize, batch_size: usize, total: usize) -> Self {
        Self {
            every: every.max(1),
            batch_size,
            total,
            window_start: Instant::now(),
        }
    }

    /// Record that `completed` batches are done
    pub fn tick(&mut self, completed: usize) -> Option<ProgressReport> {
        self.tick_at(completed, Instant::now())
    }

    /// Same as `tick`, with an explicit clock reading
    ///
    /// Reports only on multiples of the interval, then starts a new window.
    pub fn tick_at(&mut self, completed: usize, now: Instant) -> Option<ProgressReport> {
        if completed == 0 || completed % self.every != 0 {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
        let sec_per_batch = elapsed / self.every as f64;
        let examples_per_sec = if sec_per_batch > 0.0 {
            self.batch_size as f64 / sec_per_batch
        } else {
            f64::INFINITY
        };
        self.window_start = now;

        Some(ProgressReport {
            timestamp: Local::now(),
            completed,
            total: self.total,
            examples_per_sec,
            sec_per_batch,
        })
    }
}
