//! Top-level prediction run
//!
//! Restores a model from the configured checkpoint, starts the feed
//! workers, runs the inference loop and returns the collected predictions.

use crate::config::LitterboxConfig;
use crate::engine::{Coordinator, Executor, FeedEvaluator, LoopOptions, Predictions, RunPlan};
use crate::error::{PredictError, Result};
use crate::feed::Feed;
use crate::loader::{resolve_checkpoint, ResolvedCheckpoint};
use crate::model::{Model, PredictionHead, VariableSet};

/// Predictions of one run and the checkpoint they came from
#[derive(Debug)]
pub struct PredictionRun {
    pub checkpoint: ResolvedCheckpoint,
    pub variables: VariableSet,
    pub predictions: Predictions,
}

impl PredictionRun {
    /// Training step of the restored checkpoint
    pub fn step(&self) -> u64 {
        self.checkpoint.step
    }
}

/// Run batched prediction over everything `feed` holds
///
/// Returns `Ok(None)` when no checkpoint exists at the configured path; the
/// condition is logged and no worker is started. A run that ends early
/// carries `Err(partial)` predictions with the rows gathered before the
/// failure.
pub fn predict<M, F>(config: &LitterboxConfig, mut model: M, mut feed: F) -> Result<Option<PredictionRun>>
where
    M: Model,
    F: Feed,
{
    config.validate()?;

    let variables = VariableSet::select(
        config.predict.moving_average_decay,
        model.moving_average_decay(),
    );

    let checkpoint = match resolve_checkpoint(&config.predict.checkpoint_path) {
        Ok(checkpoint) => checkpoint,
        Err(e @ PredictError::CheckpointNotFound { .. }) => {
            tracing::warn!("{}", e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    model.restore(&checkpoint, variables)?;
    tracing::info!(
        "Successfully loaded model from {} at step={}.",
        checkpoint.path.display(),
        checkpoint.step
    );
    tracing::debug!("Restored {}", variables);

    let plan = RunPlan::for_feed(&feed)?;
    let coord = Coordinator::new();
    if let Err(e) = coord.launch(feed.producers()) {
        coord.join(config.predict.stop_grace_period());
        return Err(e);
    }

    let head = PredictionHead::new(model, config.dataset.has_background_class);
    let mut evaluator = FeedEvaluator::new(feed, head);
    let executor = Executor::new(coord, LoopOptions::from(&config.predict));

    let outcome = executor.run(&mut evaluator, &plan);
    Ok(Some(PredictionRun {
        checkpoint,
        variables,
        predictions: outcome.into_predictions(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeedConfig, RemainderPolicy};
    use crate::feed::{Example, FeedBatch, MemorySource, Producer, QueueFeed};
    use crate::model::{LinearCheckpoint, LinearModel, LinearParams};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write_checkpoint(dir: &TempDir) {
        LinearCheckpoint {
            variables: LinearParams {
                weights: vec![vec![1.0, 0.0, -1.0], vec![0.0, 1.0, 0.0]],
                biases: vec![0.0, 0.0, 0.0],
            },
            moving_averages: Some(LinearParams {
                weights: vec![vec![0.0, 0.0, 0.0], vec![0.0, 0.0, 0.0]],
                biases: vec![0.0, 0.0, 0.0],
            }),
        }
        .save(dir.path().join("model.ckpt-7.json"))
        .unwrap();
    }

    fn config(dir: &TempDir, batch_size: usize) -> LitterboxConfig {
        let mut config = LitterboxConfig::default();
        config.predict.checkpoint_path = dir.path().to_path_buf();
        config.predict.stop_grace_period_secs = 2;
        config.feed.batch_size = batch_size;
        config.feed.num_producers = 1;
        config.feed.queue_capacity = 16;
        config
    }

    fn feed(config: &LitterboxConfig, n: usize) -> QueueFeed<MemorySource> {
        let examples = (0..n)
            .map(|i| Example::new(format!("ex-{}", i), vec![i as f32 / 10.0, 1.0]))
            .collect();
        let source = MemorySource::new(examples).unwrap();
        QueueFeed::new(source, config.dataset.subset.clone(), &config.feed).unwrap()
    }

    #[test]
    fn test_padded_rows_are_kept() {
        let dir = TempDir::new().unwrap();
        write_checkpoint(&dir);
        let config = config(&dir, 10);

        let table = predict(&config, LinearModel::new(0.9999), feed(&config, 45))
            .unwrap()
            .unwrap()
            .predictions
            .unwrap();

        assert_eq!(table.num_rows(), 50);
        assert_eq!(table.num_classes(), 3);
        let ids = table.identities();
        assert_eq!(ids[44], "ex-44");
        assert_eq!(&ids[45..], ["ex-0", "ex-1", "ex-2", "ex-3", "ex-4"]);
    }

    #[test]
    fn test_default_producers_cover_dataset() {
        let dir = TempDir::new().unwrap();
        write_checkpoint(&dir);
        let mut config = config(&dir, 10);
        config.feed = FeedConfig {
            batch_size: 10,
            ..FeedConfig::default()
        };
        assert_eq!(config.feed.num_producers, 4);

        for _ in 0..5 {
            let run = predict(&config, LinearModel::new(0.9999), feed(&config, 45))
                .unwrap()
                .unwrap();
            let table = run.predictions.unwrap();

            assert_eq!(table.num_rows(), 50);
            let distinct: HashSet<&str> = table.identities().iter().map(String::as_str).collect();
            assert_eq!(distinct.len(), 45);
            for (i, identity) in table.identities().iter().take(45).enumerate() {
                assert_eq!(*identity, format!("ex-{}", i));
            }
        }
    }

    #[test]
    fn test_run_reports_checkpoint_step() {
        let dir = TempDir::new().unwrap();
        write_checkpoint(&dir);
        let config = config(&dir, 5);

        let run = predict(&config, LinearModel::new(0.9999), feed(&config, 5))
            .unwrap()
            .unwrap();
        assert_eq!(run.step(), 7);
        assert_eq!(run.checkpoint.path, dir.path().join("model.ckpt-7.json"));
        assert_eq!(run.variables, VariableSet::Trained);
    }

    #[test]
    fn test_truncate_to_dataset() {
        let dir = TempDir::new().unwrap();
        write_checkpoint(&dir);
        let mut config = config(&dir, 10);
        config.predict.remainder = RemainderPolicy::Truncate;

        let table = predict(&config, LinearModel::new(0.9999), feed(&config, 45))
            .unwrap()
            .unwrap()
            .predictions
            .unwrap();

        assert_eq!(table.num_rows(), 45);
        for (i, (identity, scores)) in table.rows().enumerate() {
            assert_eq!(identity, format!("ex-{}", i));
            assert!((scores.sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_background_class_is_dropped() {
        let dir = TempDir::new().unwrap();
        write_checkpoint(&dir);
        let mut config = config(&dir, 5);
        config.dataset.has_background_class = true;

        let table = predict(&config, LinearModel::new(0.9999), feed(&config, 5))
            .unwrap()
            .unwrap()
            .predictions
            .unwrap();

        assert_eq!(table.num_classes(), 2);
        for (_, scores) in table.rows() {
            assert!((scores.sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_shadow_variables_restored() {
        let dir = TempDir::new().unwrap();
        write_checkpoint(&dir);
        let mut config = config(&dir, 4);
        config.predict.moving_average_decay = Some(0.999);

        let table = predict(&config, LinearModel::new(0.9999), feed(&config, 4))
            .unwrap()
            .unwrap()
            .predictions
            .unwrap();

        // All-zero moving averages give a uniform distribution
        for (_, scores) in table.rows() {
            for p in scores.iter() {
                assert!((*p - 1.0 / 3.0).abs() < 1e-6);
            }
        }
    }

    struct CountingFeed {
        producer_calls: Arc<AtomicUsize>,
        batch_calls: Arc<AtomicUsize>,
    }

    impl Feed for CountingFeed {
        fn total_example_count(&self) -> usize {
            10
        }

        fn batch_size(&self) -> usize {
            5
        }

        fn subset_name(&self) -> &str {
            "validation"
        }

        fn producers(&mut self) -> Vec<Box<dyn Producer>> {
            self.producer_calls.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }

        fn next_batch(&mut self) -> Result<FeedBatch> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            Err(PredictError::Feed("unexpected".into()))
        }
    }

    #[test]
    fn test_missing_checkpoint_returns_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, 5);
        config.predict.checkpoint_path = dir.path().join("missing");

        let producer_calls = Arc::new(AtomicUsize::new(0));
        let batch_calls = Arc::new(AtomicUsize::new(0));
        let feed = CountingFeed {
            producer_calls: Arc::clone(&producer_calls),
            batch_calls: Arc::clone(&batch_calls),
        };

        let result = predict(&config, LinearModel::new(0.9999), feed).unwrap();
        assert!(result.is_none());
        assert_eq!(producer_calls.load(Ordering::SeqCst), 0);
        assert_eq!(batch_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_feed_failure_is_partial() {
        let dir = TempDir::new().unwrap();
        write_checkpoint(&dir);
        let config = config(&dir, 5);

        let producer_calls = Arc::new(AtomicUsize::new(0));
        let batch_calls = Arc::new(AtomicUsize::new(0));
        let feed = CountingFeed {
            producer_calls: Arc::clone(&producer_calls),
            batch_calls: Arc::clone(&batch_calls),
        };

        let partial = predict(&config, LinearModel::new(0.9999), feed)
            .unwrap()
            .unwrap()
            .predictions
            .unwrap_err();
        assert_eq!(partial.completed_batches, 0);
        assert_eq!(partial.expected_batches, 2);
        assert!(partial.table.is_empty());
        assert_eq!(producer_calls.load(Ordering::SeqCst), 1);
        assert_eq!(batch_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, 5);
        config.predict.log_every_n_batches = 0;
        let feed = feed(&LitterboxConfig::default(), 3);
        assert!(predict(&config, LinearModel::new(0.9999), feed).is_err());
    }
}
