//! Litterbox - Batched prediction for image classifiers
//!
//! Litterbox restores a trained classifier from a checkpoint and runs it
//! over a whole evaluation set, batch by batch, collecting class
//! probabilities for every example.
//!
//! # Architecture
//!
//! - **feed**: Background producers decode examples into a bounded queue
//! - **engine**: Coordinator, inference loop, progress telemetry
//! - **model**: Model trait, softmax head, reference linear classifier
//! - **loader**: Checkpoint resolution
//!
//! A run that fails part way returns the predictions gathered so far
//! together with the cause, instead of discarding them.
//!
//! # Example
//!
//! ```bash
//! # Predict with the moving-average weights
//! litterbox predict --checkpoint-path /tmp/imagenet_train --data val.csv --moving-average-decay 0.9999
//!
//! # Inspect a checkpoint
//! litterbox info /tmp/imagenet_train
//!
//! # List checkpoints in a directory
//! litterbox list /tmp/imagenet_train
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod loader;
pub mod model;
pub mod predict;

// Re-export key types
pub use config::{DatasetConfig, FeedConfig, LitterboxConfig, PredictConfig, RemainderPolicy};
pub use engine::{Coordinator, Executor, PartialResult, PredictionTable, Predictions};
pub use error::{PredictError, Result};
pub use loader::{resolve_checkpoint, ResolvedCheckpoint};
pub use model::{Model, PredictionHead, VariableSet};
pub use predict::{predict, PredictionRun};
