//! Prediction tables

use std::path::Path;

use ndarray::{concatenate, s, Array2, ArrayView1, Axis};
use thiserror::Error;

use crate::error::{PredictError, Result};

/// Outputs of one batch, paired row by row with example identities
#[derive(Debug, Clone)]
pub struct EvaluatedBatch {
    outputs: Array2<f32>,
    identities: Vec<String>,
}

impl EvaluatedBatch {
    /// Pair outputs with identities; the lengths must match
    pub fn new(outputs: Array2<f32>, identities: Vec<String>) -> Result<Self> {
        if outputs.nrows() != identities.len() {
            return Err(PredictError::Pairing {
                identities: identities.len(),
                rows: outputs.nrows(),
            });
        }
        Ok(Self {
            outputs,
            identities,
        })
    }

    /// Number of examples
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Check if the batch has no examples
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Number of score columns
    pub fn num_classes(&self) -> usize {
        self.outputs.ncols()
    }

    pub fn outputs(&self) -> &Array2<f32> {
        &self.outputs
    }

    pub fn identities(&self) -> &[String] {
        &self.identities
    }

    /// Keep only the first `len` rows
    pub fn truncate(&mut self, len: usize) {
        if len < self.len() {
            self.identities.truncate(len);
            self.outputs = self.outputs.slice(s![..len, ..]).to_owned();
        }
    }
}

/// Concatenated predictions: one row per example, identity first
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTable {
    identities: Vec<String>,
    scores: Array2<f32>,
}

impl PredictionTable {
    /// A table with no rows
    pub fn empty() -> Self {
        Self {
            identities: Vec::new(),
            scores: Array2::zeros((0, 0)),
        }
    }

    /// Stack batches row-wise, in order
    pub fn stack(batches: &[EvaluatedBatch]) -> Result<Self> {
        if batches.is_empty() {
            return Ok(Self::empty());
        }

        let views: Vec<_> = batches.iter().map(|b| b.outputs.view()).collect();
        let scores = concatenate(Axis(0), &views)?;
        let identities = batches
            .iter()
            .flat_map(|b| b.identities.iter().cloned())
            .collect();

        Ok(Self { identities, scores })
    }

    pub fn num_rows(&self) -> usize {
        self.identities.len()
    }

    pub fn num_classes(&self) -> usize {
        self.scores.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// The identity column
    pub fn identities(&self) -> &[String] {
        &self.identities
    }

    /// The class-score columns
    pub fn scores(&self) -> &Array2<f32> {
        &self.scores
    }

    /// Iterate over `(identity, scores)` rows
    pub fn rows(&self) -> impl Iterator<Item = (&str, ArrayView1<'_, f32>)> {
        self.identities
            .iter()
            .map(String::as_str)
            .zip(self.scores.rows())
    }

    /// Write the table as CSV: `identity,class_0,...,class_{K-1}`
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;

        let header = std::iter::once("identity".to_string())
            .chain((0..self.num_classes()).map(|k| format!("class_{}", k)));
        writer.write_record(header)?;

        for (identity, scores) in self.rows() {
            let record = std::iter::once(identity.to_string())
                .chain(scores.iter().map(|s| s.to_string()));
            writer.write_record(record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Predictions from a run that ended before every batch was evaluated
#[derive(Error, Debug)]
#[error("prediction stopped after {completed_batches} of {expected_batches} batches: {cause}")]
pub struct PartialResult {
    /// Rows from the batches evaluated before the stop
    pub table: PredictionTable,
    /// Why the run ended early
    pub cause: String,
    pub completed_batches: usize,
    pub expected_batches: usize,
}

/// Full table on success, partial table and cause otherwise
pub type Predictions = std::result::Result<PredictionTable, PartialResult>;
