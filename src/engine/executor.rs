//! Inference loop
//!
//! Pulls evaluated batches until the planned number of iterations is done
//! or a stop is requested, then stops and joins the feed workers and stacks
//! what was collected. A failing batch ends the run early with the batches
//! gathered so far.

use std::time::Duration;

use chrono::Local;

use super::coordinator::{Coordinator, JoinReport};
use super::progress::{ProgressMeter, ProgressReport, TIMESTAMP_FORMAT};
use super::table::{EvaluatedBatch, PartialResult, PredictionTable, Predictions};
use crate::config::{PredictConfig, RemainderPolicy};
use crate::error::{PredictError, Result};
use crate::feed::Feed;
use crate::model::{Model, PredictionHead};

/// Produces one evaluated batch per call
///
/// Outputs and identities must come out of the same call so that row `i`
/// of the outputs belongs to identity `i`.
pub trait BatchEvaluator {
    fn evaluate(&mut self) -> Result<EvaluatedBatch>;
}

/// Evaluates feed batches through a prediction head
pub struct FeedEvaluator<F, M> {
    feed: F,
    head: PredictionHead<M>,
}

impl<F: Feed, M: Model> FeedEvaluator<F, M> {
    /// Create a new evaluator
    pub fn new(feed: F, head: PredictionHead<M>) -> Self {
        Self { feed, head }
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn head(&self) -> &PredictionHead<M> {
        &self.head
    }
}

impl<F: Feed, M: Model> BatchEvaluator for FeedEvaluator<F, M> {
    fn evaluate(&mut self) -> Result<EvaluatedBatch> {
        let batch = self.feed.next_batch()?;
        let outputs = self.head.probabilities(batch.inputs.view())?;
        EvaluatedBatch::new(outputs, batch.identities)
    }
}

/// Size of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub total_examples: usize,
    pub batch_size: usize,
    /// Subset name, for logs
    pub subset: String,
}

impl RunPlan {
    /// Create a plan; the batch size must be positive
    pub fn new(total_examples: usize, batch_size: usize, subset: impl Into<String>) -> Result<Self> {
        if batch_size == 0 {
            return Err(PredictError::Config("batch_size must be positive".into()));
        }
        Ok(Self {
            total_examples,
            batch_size,
            subset: subset.into(),
        })
    }

    /// Plan a run over everything a feed holds
    pub fn for_feed<F: Feed + ?Sized>(feed: &F) -> Result<Self> {
        Self::new(feed.total_example_count(), feed.batch_size(), feed.subset_name())
    }

    /// Number of batches, rounded up
    ///
    /// When the example count is not a multiple of the batch size the last
    /// batch holds padding from the feed.
    pub fn iterations(&self) -> usize {
        self.total_examples.div_ceil(self.batch_size)
    }
}

/// Loop settings
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub log_every_n_batches: usize,
    pub stop_grace_period: Duration,
    pub remainder: RemainderPolicy,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self::from(&PredictConfig::default())
    }
}

impl From<&PredictConfig> for LoopOptions {
    fn from(config: &PredictConfig) -> Self {
        Self {
            log_every_n_batches: config.log_every_n_batches,
            stop_grace_period: config.stop_grace_period(),
            remainder: config.remainder,
        }
    }
}

/// Why the loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// Every planned batch was evaluated
    Completed,
    /// A batch failed
    Failed(String),
    /// A stop was requested elsewhere, with its cause if one was recorded
    Stopped(Option<String>),
}

/// Everything a finished loop produced
#[derive(Debug)]
pub struct LoopOutcome {
    pub table: PredictionTable,
    /// Batches evaluated
    pub completed: usize,
    /// Batches planned
    pub iterations: usize,
    /// Progress lines emitted
    pub reports: Vec<ProgressReport>,
    pub exit: LoopExit,
    pub join: JoinReport,
}

impl LoopOutcome {
    /// Check if every planned batch was evaluated
    pub fn is_complete(&self) -> bool {
        self.exit == LoopExit::Completed
    }

    /// Split into a full table or a partial result
    pub fn into_predictions(self) -> Predictions {
        let cause = match self.exit {
            LoopExit::Completed => return Ok(self.table),
            LoopExit::Failed(cause) | LoopExit::Stopped(Some(cause)) => cause,
            LoopExit::Stopped(None) => "stop requested".to_string(),
        };
        Err(PartialResult {
            table: self.table,
            cause,
            completed_batches: self.completed,
            expected_batches: self.iterations,
        })
    }
}

/// Runs the inference loop under a coordinator
pub struct Executor {
    coord: Coordinator,
    options: LoopOptions,
}

impl Executor {
    /// Create a new executor
    pub fn new(coord: Coordinator, options: LoopOptions) -> Self {
        Self { coord, options }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coord
    }

    /// Evaluate `plan.iterations()` batches
    ///
    /// Always stops and joins the coordinator's workers before returning,
    /// whatever ended the loop.
    pub fn run<E: BatchEvaluator + ?Sized>(&self, evaluator: &mut E, plan: &RunPlan) -> LoopOutcome {
        let iterations = plan.iterations();
        tracing::info!(
            "{}: starting inference on {} examples in ({}).",
            Local::now().format(TIMESTAMP_FORMAT),
            plan.total_examples,
            plan.subset
        );

        let mut meter = ProgressMeter::new(self.options.log_every_n_batches, plan.batch_size, iterations);
        let mut batches: Vec<EvaluatedBatch> = Vec::with_capacity(iterations);
        let mut reports = Vec::new();
        let mut rows = 0usize;
        let mut completed = 0usize;
        let mut failure: Option<String> = None;

        while completed < iterations && !self.coord.should_stop() {
            let batch = match self.next_batch(evaluator, &batches, rows, plan) {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!("Batch {} of {} failed: {}", completed + 1, iterations, e);
                    self.coord.request_stop_with(&e);
                    failure = Some(e.to_string());
                    break;
                }
            };

            rows += batch.len();
            batches.push(batch);
            completed += 1;

            if let Some(report) = meter.tick(completed) {
                tracing::info!("{}", report);
                reports.push(report);
            }
        }

        self.coord.request_stop();
        let join = self.coord.join(self.options.stop_grace_period);

        let table = match PredictionTable::stack(&batches) {
            Ok(table) => table,
            Err(e) => {
                failure.get_or_insert_with(|| e.to_string());
                PredictionTable::empty()
            }
        };

        let exit = match failure {
            Some(cause) => LoopExit::Failed(cause),
            None if completed < iterations => LoopExit::Stopped(self.coord.cause()),
            None => LoopExit::Completed,
        };

        tracing::debug!(
            "Inference loop finished: {}/{} batches, {} rows, {:?}",
            completed,
            iterations,
            table.num_rows(),
            exit
        );

        LoopOutcome {
            table,
            completed,
            iterations,
            reports,
            exit,
            join,
        }
    }

    /// Evaluate one batch and fit it to the rows collected so far
    fn next_batch<E: BatchEvaluator + ?Sized>(
        &self,
        evaluator: &mut E,
        batches: &[EvaluatedBatch],
        rows: usize,
        plan: &RunPlan,
    ) -> Result<EvaluatedBatch> {
        let mut batch = evaluator.evaluate()?;

        if let Some(first) = batches.first() {
            if batch.num_classes() != first.num_classes() {
                return Err(PredictError::BatchEvaluation(format!(
                    "batch has {} score columns, earlier batches had {}",
                    batch.num_classes(),
                    first.num_classes()
                )));
            }
        }

        if self.options.remainder == RemainderPolicy::Truncate {
            batch.truncate(plan.total_examples.saturating_sub(rows));
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::thread;

    /// Yields batches with identities `b<batch>-<row>`, failing on one batch
    struct Stub {
        batch_size: usize,
        classes: usize,
        calls: usize,
        fail_on: Option<usize>,
    }

    impl Stub {
        fn new(batch_size: usize) -> Self {
            Self {
                batch_size,
                classes: 3,
                calls: 0,
                fail_on: None,
            }
        }
    }

    impl BatchEvaluator for Stub {
        fn evaluate(&mut self) -> Result<EvaluatedBatch> {
            self.calls += 1;
            if self.fail_on == Some(self.calls) {
                return Err(PredictError::BatchEvaluation("decode failed".into()));
            }
            let outputs = Array2::from_shape_fn((self.batch_size, self.classes), |(r, c)| {
                (self.calls * 100 + r * 10 + c) as f32
            });
            let identities = (0..self.batch_size)
                .map(|r| format!("b{}-{}", self.calls, r))
                .collect();
            EvaluatedBatch::new(outputs, identities)
        }
    }

    fn options() -> LoopOptions {
        LoopOptions {
            log_every_n_batches: 20,
            stop_grace_period: Duration::from_secs(1),
            remainder: RemainderPolicy::Keep,
        }
    }

    #[test]
    fn test_iterations_round_up() {
        for (total, size, expected) in [(45, 10, 5), (40, 10, 4), (0, 10, 0), (1, 10, 1), (7, 1, 7)] {
            assert_eq!(RunPlan::new(total, size, "t").unwrap().iterations(), expected);
        }
        assert!(RunPlan::new(10, 0, "t").is_err());
    }

    #[test]
    fn test_padded_final_batch_is_kept() {
        let executor = Executor::new(Coordinator::new(), options());
        let plan = RunPlan::new(45, 10, "validation").unwrap();
        let mut stub = Stub::new(10);

        let outcome = executor.run(&mut stub, &plan);
        assert!(outcome.is_complete());
        assert_eq!(outcome.completed, 5);
        // The loop does not trim the padded rows of the last batch
        assert_eq!(outcome.table.num_rows(), 50);
    }

    #[test]
    fn test_truncate_clips_to_dataset() {
        let executor = Executor::new(
            Coordinator::new(),
            LoopOptions {
                remainder: RemainderPolicy::Truncate,
                ..options()
            },
        );
        let plan = RunPlan::new(45, 10, "validation").unwrap();
        let outcome = executor.run(&mut Stub::new(10), &plan);

        assert_eq!(outcome.table.num_rows(), 45);
        assert_eq!(outcome.table.identities().last().unwrap(), "b5-4");
    }

    #[test]
    fn test_rows_stay_paired_with_identities() {
        let executor = Executor::new(Coordinator::new(), options());
        let plan = RunPlan::new(30, 10, "validation").unwrap();
        let outcome = executor.run(&mut Stub::new(10), &plan);

        for (identity, scores) in outcome.table.rows() {
            let (batch, row) = identity[1..].split_once('-').unwrap();
            let batch: usize = batch.parse().unwrap();
            let row: usize = row.parse().unwrap();
            assert_eq!(scores[0], (batch * 100 + row * 10) as f32);
        }
    }

    #[test]
    fn test_failure_keeps_earlier_batches() {
        for k in 1..=4 {
            let coord = Coordinator::new();
            let executor = Executor::new(coord.clone(), options());
            let plan = RunPlan::new(40, 10, "validation").unwrap();
            let mut stub = Stub::new(10);
            stub.fail_on = Some(k);

            let outcome = executor.run(&mut stub, &plan);
            assert_eq!(outcome.completed, k - 1);
            assert_eq!(outcome.table.num_rows(), (k - 1) * 10);
            assert!(matches!(outcome.exit, LoopExit::Failed(_)));
            assert!(coord.should_stop());
            // No batch is evaluated after the failure
            assert_eq!(stub.calls, k);

            let partial = outcome.into_predictions().unwrap_err();
            assert_eq!(partial.completed_batches, k - 1);
            assert_eq!(partial.expected_batches, 4);
            assert!(partial.cause.contains("decode failed"));
        }
    }

    #[test]
    fn test_changing_width_is_a_failure() {
        struct Shrinking(usize);
        impl BatchEvaluator for Shrinking {
            fn evaluate(&mut self) -> Result<EvaluatedBatch> {
                self.0 += 1;
                let width = if self.0 == 1 { 3 } else { 2 };
                EvaluatedBatch::new(Array2::zeros((1, width)), vec![format!("x{}", self.0)])
            }
        }

        let executor = Executor::new(Coordinator::new(), options());
        let plan = RunPlan::new(3, 1, "validation").unwrap();
        let outcome = executor.run(&mut Shrinking(0), &plan);
        assert_eq!(outcome.table.num_rows(), 1);
        assert!(matches!(outcome.exit, LoopExit::Failed(_)));
    }

    #[test]
    fn test_progress_every_twenty_batches() {
        let executor = Executor::new(Coordinator::new(), options());
        let plan = RunPlan::new(650, 10, "validation").unwrap();
        let outcome = executor.run(&mut Stub::new(10), &plan);

        let at: Vec<usize> = outcome.reports.iter().map(|r| r.completed).collect();
        assert_eq!(at, vec![20, 40, 60]);
        assert!(outcome.reports.iter().all(|r| r.total == 65));
    }

    #[test]
    fn test_foreign_stop_ends_loop() {
        struct StopAfter {
            inner: Stub,
            coord: Coordinator,
            after: usize,
        }
        impl BatchEvaluator for StopAfter {
            fn evaluate(&mut self) -> Result<EvaluatedBatch> {
                let batch = self.inner.evaluate();
                if self.inner.calls == self.after {
                    self.coord.request_stop_with("producer failed");
                }
                batch
            }
        }

        let coord = Coordinator::new();
        let executor = Executor::new(coord.clone(), options());
        let plan = RunPlan::new(100, 10, "validation").unwrap();
        let mut evaluator = StopAfter {
            inner: Stub::new(10),
            coord,
            after: 3,
        };

        let outcome = executor.run(&mut evaluator, &plan);
        assert_eq!(outcome.completed, 3);
        assert_eq!(outcome.exit, LoopExit::Stopped(Some("producer failed".into())));
        assert_eq!(outcome.into_predictions().unwrap_err().table.num_rows(), 30);
    }

    #[test]
    fn test_workers_are_joined_on_exit() {
        let coord = Coordinator::new();
        for i in 0..2 {
            let c = coord.clone();
            coord
                .spawn(format!("worker-{}", i), move || {
                    while !c.should_stop() {
                        thread::sleep(Duration::from_millis(1));
                    }
                })
                .unwrap();
        }

        let executor = Executor::new(coord.clone(), options());
        let plan = RunPlan::new(20, 10, "validation").unwrap();
        let mut stub = Stub::new(10);
        stub.fail_on = Some(2);

        let outcome = executor.run(&mut stub, &plan);
        assert_eq!(outcome.join, JoinReport { joined: 2, detached: 0 });
        assert_eq!(coord.running_threads(), 0);
    }

    #[test]
    fn test_empty_plan() {
        let executor = Executor::new(Coordinator::new(), options());
        let plan = RunPlan::new(0, 10, "validation").unwrap();
        let mut stub = Stub::new(10);

        let outcome = executor.run(&mut stub, &plan);
        assert!(outcome.is_complete());
        assert_eq!(stub.calls, 0);
        assert!(outcome.into_predictions().unwrap().is_empty());
    }
}
