//! CLI commands
//!
//! Provides the command line interface for litterbox.

mod info;
mod list;
mod predict;

pub use info::info;
pub use list::list;
pub use predict::predict;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{LitterboxConfig, RemainderPolicy};

/// Litterbox - Batched prediction for image classifiers
#[derive(Parser)]
#[command(name = "litterbox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict class probabilities for every example of a dataset
    Predict(PredictArgs),

    /// Show checkpoint information
    Info {
        /// Checkpoint file, prefix or directory
        checkpoint: PathBuf,
    },

    /// List checkpoints in a directory
    List {
        /// Directory holding checkpoints
        dir: PathBuf,
    },
}

/// Options of the `predict` command
///
/// Flags override the values read from `--config`.
#[derive(Args, Debug, Default)]
pub struct PredictArgs {
    /// YAML or JSON configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Checkpoint file, prefix or directory
    #[arg(long)]
    pub checkpoint_path: Option<PathBuf>,

    /// CSV file of preprocessed examples
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Directory to write predictions.csv to
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Examples per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Number of feed worker threads
    #[arg(long)]
    pub num_producers: Option<usize>,

    /// Restore the moving averages of the variables instead of their raw values
    #[arg(long)]
    pub moving_average_decay: Option<f32>,

    /// Class 0 is a background class dropped from the output
    #[arg(long)]
    pub has_background_class: bool,

    /// Drop padded rows of the final batch
    #[arg(long)]
    pub truncate: bool,
}

impl PredictArgs {
    /// Build the run configuration: file values first, then flags
    pub fn to_config(&self) -> crate::error::Result<LitterboxConfig> {
        let mut config = match &self.config {
            Some(path) => LitterboxConfig::from_path(path)?,
            None => LitterboxConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut LitterboxConfig) {
        if let Some(path) = &self.checkpoint_path {
            config.predict.checkpoint_path = path.clone();
        }
        if let Some(path) = &self.data {
            config.dataset.data_path = Some(path.clone());
        }
        if let Some(dir) = &self.output {
            config.predict.predict_dir = dir.clone();
        }
        if let Some(size) = self.batch_size {
            config.feed.batch_size = size;
        }
        if let Some(n) = self.num_producers {
            config.feed.num_producers = n;
        }
        if self.moving_average_decay.is_some() {
            config.predict.moving_average_decay = self.moving_average_decay;
        }
        if self.has_background_class {
            config.dataset.has_background_class = true;
        }
        if self.truncate {
            config.predict.remainder = RemainderPolicy::Truncate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_predict_flags() {
        let cli = Cli::parse_from([
            "litterbox",
            "predict",
            "--checkpoint-path",
            "/ckpt",
            "--batch-size",
            "8",
            "--moving-average-decay",
            "0.999",
            "--truncate",
        ]);
        let Commands::Predict(args) = cli.command else {
            panic!("expected predict command");
        };

        let config = args.to_config().unwrap();
        assert_eq!(config.predict.checkpoint_path, PathBuf::from("/ckpt"));
        assert_eq!(config.feed.batch_size, 8);
        assert_eq!(config.predict.moving_average_decay, Some(0.999));
        assert_eq!(config.predict.remainder, RemainderPolicy::Truncate);
        assert!(!config.dataset.has_background_class);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "feed:\n  batch_size: 64\n  num_producers: 2\n").unwrap();

        let args = PredictArgs {
            config: Some(path),
            num_producers: Some(3),
            ..Default::default()
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.feed.batch_size, 64);
        assert_eq!(config.feed.num_producers, 3);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = PredictArgs {
            batch_size: Some(0),
            ..Default::default()
        };
        assert!(args.to_config().is_err());
    }
}
