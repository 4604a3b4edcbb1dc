//! Feed settings

use serde::{Deserialize, Serialize};

/// Settings for the background data feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Examples per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of background producer threads
    #[serde(default = "default_num_producers")]
    pub num_producers: usize,

    /// Capacity of the production queue, in examples
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Shuffle example order each epoch
    #[serde(default)]
    pub shuffle: bool,

    /// Seed for the shuffle (None = random)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_batch_size() -> usize {
    32
}

fn default_num_producers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            num_producers: default_num_producers(),
            queue_capacity: default_queue_capacity(),
            shuffle: false,
            seed: None,
        }
    }
}
