//! Data feeding
//!
//! A `Feed` hands the inference loop batches of preprocessed inputs together
//! with the identity of every example. Decoding happens on background
//! `Producer` threads that fill a bounded queue; the feed only registers
//! them, and the engine's `Coordinator` starts and stops them.

mod queue;
mod source;

pub use queue::QueueFeed;
pub use source::{CsvSource, MemorySource};

use ndarray::Array2;

use crate::engine::Coordinator;
use crate::error::Result;

/// One preprocessed example
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    /// Opaque key identifying the example
    pub identity: String,
    /// Model input features
    pub features: Vec<f32>,
}

impl Example {
    /// Create a new example
    pub fn new(identity: impl Into<String>, features: Vec<f32>) -> Self {
        Self {
            identity: identity.into(),
            features,
        }
    }
}

/// A batch of inputs and the parallel identities
///
/// Row `i` of `inputs` belongs to `identities[i]`.
#[derive(Debug, Clone)]
pub struct FeedBatch {
    pub inputs: Array2<f32>,
    pub identities: Vec<String>,
}

/// Random access to the examples of a dataset
pub trait ExampleSource: Send + Sync + 'static {
    /// Number of examples in one epoch
    fn len(&self) -> usize;

    /// Check if the source has no examples
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of features per example
    fn feature_dim(&self) -> usize;

    /// Load and decode one example
    fn load(&self, index: usize) -> Result<Example>;
}

/// A background worker filling a feed's queue
pub trait Producer: Send {
    /// Thread name
    fn name(&self) -> String;

    /// Produce until the data runs out or the coordinator asks to stop
    ///
    /// A producer that fails requests a stop with its error as the cause.
    fn run(self: Box<Self>, coord: &Coordinator);
}

/// Source of evaluation batches
pub trait Feed: Send {
    /// Number of examples in the dataset
    fn total_example_count(&self) -> usize;

    /// Examples per batch
    fn batch_size(&self) -> usize;

    /// Name of the subset being fed, for logs
    fn subset_name(&self) -> &str;

    /// Hand over the registered background producers
    ///
    /// The first call returns every producer; later calls return none.
    fn producers(&mut self) -> Vec<Box<dyn Producer>>;

    /// Block until the next batch is available
    fn next_batch(&mut self) -> Result<FeedBatch>;
}
