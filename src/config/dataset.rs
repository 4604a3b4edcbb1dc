//! Dataset settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Description of the held-out dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset name, for logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Subset being predicted (e.g. "validation")
    #[serde(default = "default_subset")]
    pub subset: String,

    /// Preprocessed examples (CSV: identity, then feature columns)
    #[serde(default)]
    pub data_path: Option<PathBuf>,

    /// Class 0 is a reserved background class excluded from the softmax
    #[serde(default)]
    pub has_background_class: bool,

    /// The CSV file starts with a header row
    #[serde(default = "default_true")]
    pub has_header: bool,
}

fn default_name() -> String {
    "imagenet".to_string()
}

fn default_subset() -> String {
    "validation".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            subset: default_subset(),
            data_path: None,
            has_background_class: false,
            has_header: true,
        }
    }
}
