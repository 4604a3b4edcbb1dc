//! Error types for litterbox

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up or running a prediction.
#[derive(Error, Debug)]
pub enum PredictError {
    /// No checkpoint could be resolved from the configured path
    #[error("No checkpoint file found at {}", path.display())]
    CheckpointNotFound { path: PathBuf },

    /// A checkpoint was found but its name or state file is malformed
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Restoring parameters from a resolved checkpoint failed
    #[error("Failed to restore model from {}: {reason}", path.display())]
    Restore { path: PathBuf, reason: String },

    /// The data feed failed or closed early
    #[error("Feed error: {0}")]
    Feed(String),

    /// The model rejected its inputs or produced unusable outputs
    #[error("Model error: {0}")]
    Model(String),

    /// Computing or fetching one batch failed
    #[error("Batch evaluation failed: {0}")]
    BatchEvaluation(String),

    /// Outputs and identities of one batch have different lengths
    #[error("Batch pairing violated: {identities} identities for {rows} output rows")]
    Pairing { identities: usize, rows: usize },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, PredictError>;
