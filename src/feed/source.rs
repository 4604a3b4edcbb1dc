//! Example sources

use std::path::{Path, PathBuf};

use super::{Example, ExampleSource};
use crate::error::{PredictError, Result};

/// Examples held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    examples: Vec<Example>,
    feature_dim: usize,
}

impl MemorySource {
    /// Create a source; every example must have the same number of features
    pub fn new(examples: Vec<Example>) -> Result<Self> {
        let feature_dim = examples.first().map(|e| e.features.len()).unwrap_or(0);
        if let Some(bad) = examples.iter().find(|e| e.features.len() != feature_dim) {
            return Err(PredictError::Feed(format!(
                "example {} has {} features, expected {}",
                bad.identity,
                bad.features.len(),
                feature_dim
            )));
        }
        Ok(Self {
            examples,
            feature_dim,
        })
    }
}

impl ExampleSource for MemorySource {
    fn len(&self) -> usize {
        self.examples.len()
    }

    fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    fn load(&self, index: usize) -> Result<Example> {
        self.examples
            .get(index)
            .cloned()
            .ok_or_else(|| PredictError::Feed(format!("example index {} out of range", index)))
    }
}

/// Examples stored as CSV rows: identity first, then feature columns
///
/// Rows are read up front; parsing the features happens in `load`, on the
/// producer threads.
#[derive(Debug)]
pub struct CsvSource {
    path: PathBuf,
    records: Vec<csv::StringRecord>,
    feature_dim: usize,
}

impl CsvSource {
    /// Read the rows of a CSV file
    pub fn open<P: AsRef<Path>>(path: P, has_header: bool) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(has_header)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        let feature_dim = records.first().map(|r| r.len().saturating_sub(1)).unwrap_or(0);

        if records.first().is_some() && feature_dim == 0 {
            return Err(PredictError::Feed(format!(
                "{} has no feature columns",
                path.display()
            )));
        }

        tracing::debug!(
            "Read {} examples with {} features from {}",
            records.len(),
            feature_dim,
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            records,
            feature_dim,
        })
    }
}

impl ExampleSource for CsvSource {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    fn load(&self, index: usize) -> Result<Example> {
        let record = self
            .records
            .get(index)
            .ok_or_else(|| PredictError::Feed(format!("example index {} out of range", index)))?;

        if record.len() != self.feature_dim + 1 {
            return Err(PredictError::Feed(format!(
                "{}: row {} has {} columns, expected {}",
                self.path.display(),
                index,
                record.len(),
                self.feature_dim + 1
            )));
        }

        let identity = record.get(0).unwrap_or_default().to_string();
        let features = record
            .iter()
            .skip(1)
            .enumerate()
            .map(|(col, field)| {
                field.parse::<f32>().map_err(|e| {
                    PredictError::Feed(format!(
                        "{}: row {} column {}: {}",
                        self.path.display(),
                        index,
                        col + 1,
                        e
                    ))
                })
            })
            .collect::<Result<Vec<f32>>>()?;

        Ok(Example { identity, features })
    }
}
