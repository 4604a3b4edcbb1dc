//! Class-score normalization

use ndarray::{s, Array2, ArrayView2};

use super::Model;
use crate::error::{PredictError, Result};

/// Row-wise softmax, shifted by the row maximum for stability
///
/// A row with `+inf` logits splits the mass evenly between them; a row of
/// only `-inf` logits becomes uniform.
pub fn softmax_rows(logits: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut out = logits.to_owned();
    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));

        if max == f32::INFINITY {
            let hits = row.iter().filter(|v| **v == f32::INFINITY).count() as f32;
            row.mapv_inplace(|v| if v == f32::INFINITY { 1.0 / hits } else { 0.0 });
            continue;
        }
        if max == f32::NEG_INFINITY {
            let uniform = 1.0 / row.len() as f32;
            row.fill(uniform);
            continue;
        }

        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
    out
}

/// A model plus the softmax applied to its logits
///
/// With a background class, column 0 of the logits is dropped before the
/// softmax, so the probabilities have one column fewer than the raw output.
pub struct PredictionHead<M> {
    model: M,
    has_background_class: bool,
}

impl<M: Model> PredictionHead<M> {
    /// Create a new prediction head
    pub fn new(model: M, has_background_class: bool) -> Self {
        Self {
            model,
            has_background_class,
        }
    }

    /// Number of probability columns produced
    pub fn num_classes(&self) -> usize {
        let raw = self.model.num_outputs();
        if self.has_background_class {
            raw.saturating_sub(1)
        } else {
            raw
        }
    }

    /// Check if class 0 is excluded
    pub fn has_background_class(&self) -> bool {
        self.has_background_class
    }

    /// Get the wrapped model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Compute class probabilities for a batch
    pub fn probabilities(&self, inputs: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let logits = self.model.forward(inputs)?;

        if logits.nrows() != inputs.nrows() {
            return Err(PredictError::Model(format!(
                "model returned {} rows for {} inputs",
                logits.nrows(),
                inputs.nrows()
            )));
        }

        if self.has_background_class {
            if logits.ncols() < 2 {
                return Err(PredictError::Model(format!(
                    "background class needs at least 2 outputs, got {}",
                    logits.ncols()
                )));
            }
            Ok(softmax_rows(logits.slice(s![.., 1..])))
        } else {
            Ok(softmax_rows(logits.view()))
        }
    }
}
