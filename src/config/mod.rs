//! Configuration system for litterbox
//!
//! LitterboxConfig groups the run, dataset, feed and model settings.
//! Every field has a default, so a config file only needs the values
//! that differ.

mod dataset;
mod feed;
mod predict;

pub use dataset::DatasetConfig;
pub use feed::FeedConfig;
pub use predict::{PredictConfig, RemainderPolicy};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PredictError, Result};

/// Model settings that are not stored in the checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Decay constant the model was trained with for its shadow variables
    #[serde(default = "default_model_decay")]
    pub moving_average_decay: f32,
}

fn default_model_decay() -> f32 {
    0.9999
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            moving_average_decay: default_model_decay(),
        }
    }
}

/// Litterbox configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LitterboxConfig {
    /// Run settings
    #[serde(default)]
    pub predict: PredictConfig,

    /// Dataset description
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Feed settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Model settings
    #[serde(default)]
    pub model: ModelConfig,
}

impl LitterboxConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, picking the format from the file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            Some("yaml") | Some("yml") => Self::from_yaml(path),
            other => Err(PredictError::Config(format!(
                "unsupported config format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Reject values the run cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.feed.batch_size == 0 {
            return Err(PredictError::Config("batch_size must be positive".into()));
        }
        if self.feed.num_producers == 0 {
            return Err(PredictError::Config("num_producers must be positive".into()));
        }
        if self.feed.queue_capacity == 0 {
            return Err(PredictError::Config("queue_capacity must be positive".into()));
        }
        if self.predict.log_every_n_batches == 0 {
            return Err(PredictError::Config(
                "log_every_n_batches must be positive".into(),
            ));
        }
        for decay in self
            .predict
            .moving_average_decay
            .iter()
            .chain(std::iter::once(&self.model.moving_average_decay))
        {
            if !(*decay > 0.0 && *decay < 1.0) {
                return Err(PredictError::Config(format!(
                    "moving_average_decay must be in (0, 1), got {}",
                    decay
                )));
            }
        }
        Ok(())
    }
}
