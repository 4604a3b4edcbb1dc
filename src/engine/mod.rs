//! Core inference engine
//!
//! This module provides the batched prediction pipeline:
//! - Coordinator: Stop token and join for background feed workers
//! - Executor: Runs the inference loop over evaluated batches
//! - Progress: Throughput telemetry for long runs
//! - Table: Prediction rows paired with example identities

mod coordinator;
mod executor;
mod progress;
mod table;

pub use coordinator::{Coordinator, JoinReport};
pub use executor::{
    BatchEvaluator, Executor, FeedEvaluator, LoopExit, LoopOptions, LoopOutcome, RunPlan,
};
pub use progress::{ProgressMeter, ProgressReport};
pub use table::{EvaluatedBatch, PartialResult, PredictionTable, Predictions};
