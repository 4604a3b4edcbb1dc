//! Cooperative shutdown for background feed workers
//!
//! A `Coordinator` is a cloneable handle shared by the inference loop and
//! every producer thread. Stopping is cooperative: workers check
//! `should_stop` between units of work and return on their own. Nothing is
//! interrupted mid-flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{PredictError, Result};
use crate::feed::Producer;

/// Poll interval while waiting for workers to finish
const JOIN_POLL: Duration = Duration::from_millis(5);

#[derive(Default)]
struct Inner {
    stop: AtomicBool,
    cause: Mutex<Option<String>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

/// Shared stop token and registry of worker threads
#[derive(Clone, Default)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

/// Outcome of joining the worker threads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Threads that finished within the grace period
    pub joined: usize,
    /// Threads still running when the grace period ran out
    pub detached: usize,
}

impl Coordinator {
    /// Create a new coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// Request all workers to stop
    ///
    /// Returns `true` only for the call that actually raised the flag; later
    /// calls, concurrent or not, are no-ops.
    pub fn request_stop(&self) -> bool {
        self.inner
            .stop
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Request a stop and record why
    ///
    /// Only the first recorded cause is kept.
    pub fn request_stop_with(&self, cause: impl ToString) -> bool {
        {
            let mut slot = self.inner.cause.lock();
            if slot.is_none() {
                *slot = Some(cause.to_string());
            }
        }
        self.request_stop()
    }

    /// Check whether a stop was requested
    pub fn should_stop(&self) -> bool {
        self.inner.stop.load(Ordering::Acquire)
    }

    /// The first recorded stop cause, if any
    pub fn cause(&self) -> Option<String> {
        self.inner.cause.lock().clone()
    }

    /// Spawn a thread under this coordinator
    pub fn spawn<F>(&self, name: String, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(work)
            .map_err(|e| PredictError::Feed(format!("failed to spawn {}: {}", name, e)))?;
        self.inner.threads.lock().push(handle);
        Ok(())
    }

    /// Start one thread per producer
    ///
    /// If a thread cannot be spawned, a stop is requested so the producers
    /// already running wind down.
    pub fn launch(&self, producers: Vec<Box<dyn Producer>>) -> Result<usize> {
        let count = producers.len();
        for producer in producers {
            let name = producer.name();
            let coord = self.clone();
            if let Err(e) = self.spawn(name, move || producer.run(&coord)) {
                self.request_stop_with(&e);
                return Err(e);
            }
        }
        tracing::debug!("Started {} feed workers", count);
        Ok(count)
    }

    /// Number of threads not yet joined
    pub fn running_threads(&self) -> usize {
        self.inner.threads.lock().len()
    }

    /// Wait for the registered threads, up to `grace`
    ///
    /// Threads still running after the grace period are detached, not
    /// killed. Rust threads never keep the process alive, so a detached
    /// worker only leaks until exit.
    pub fn join(&self, grace: Duration) -> JoinReport {
        let deadline = Instant::now() + grace;
        let mut pending = std::mem::take(&mut *self.inner.threads.lock());
        let mut report = JoinReport::default();

        loop {
            let (finished, running): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|h| h.is_finished());

            for handle in finished {
                if handle.join().is_err() {
                    tracing::warn!("Feed worker panicked");
                }
                report.joined += 1;
            }

            pending = running;
            if pending.is_empty() || Instant::now() >= deadline {
                break;
            }
            thread::sleep(JOIN_POLL);
        }

        report.detached = pending.len();
        if report.detached > 0 {
            tracing::warn!(
                "{} feed worker(s) still running after {:?} grace period, detaching",
                report.detached,
                grace
            );
        }
        report
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("stopped", &self.should_stop())
            .field("threads", &self.running_threads())
            .finish()
    }
}
