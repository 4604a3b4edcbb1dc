//! Prediction run settings

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do with rows produced past the declared dataset size.
///
/// The iteration count is rounded up to whole batches, so the final batch
/// may carry examples the feed wrapped around from the next epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemainderPolicy {
    /// Keep every row the feed produced, including wrapped padding
    #[default]
    Keep,
    /// Clip the table to the declared example count
    Truncate,
}

/// Settings for one prediction run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictConfig {
    /// Directory or file to read the model checkpoint from
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,

    /// Directory where predictions are written
    #[serde(default = "default_predict_dir")]
    pub predict_dir: PathBuf,

    /// Restore moving-average shadow variables when set
    #[serde(default)]
    pub moving_average_decay: Option<f32>,

    /// Emit a progress line every this many batches
    #[serde(default = "default_log_every")]
    pub log_every_n_batches: usize,

    /// How long to wait for feed workers after a stop request
    #[serde(default = "default_grace_secs")]
    pub stop_grace_period_secs: u64,

    /// Handling of rows past the declared example count
    #[serde(default)]
    pub remainder: RemainderPolicy,
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("/tmp/imagenet_train")
}

fn default_predict_dir() -> PathBuf {
    PathBuf::from("/tmp/imagenet_predict")
}

fn default_log_every() -> usize {
    20
}

fn default_grace_secs() -> u64 {
    10
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: default_checkpoint_path(),
            predict_dir: default_predict_dir(),
            moving_average_decay: None,
            log_every_n_batches: default_log_every(),
            stop_grace_period_secs: default_grace_secs(),
            remainder: RemainderPolicy::Keep,
        }
    }
}

impl PredictConfig {
    /// Grace period for joining feed workers
    pub fn stop_grace_period(&self) -> Duration {
        Duration::from_secs(self.stop_grace_period_secs)
    }

    /// Output file for the prediction table
    pub fn predictions_path(&self) -> PathBuf {
        self.predict_dir.join("predictions.csv")
    }
}
