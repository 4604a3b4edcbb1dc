//! Linear classifier
//!
//! A single dense layer, `logits = x · W + b`. It serves as the reference
//! engine for the command line and for tests. Its checkpoints are JSON
//! files holding the trained parameters and, optionally, their moving
//! averages.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{Model, VariableSet};
use crate::error::{PredictError, Result};
use crate::loader::ResolvedCheckpoint;

/// Parameters of one linear layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearParams {
    /// Weight matrix, one row per input feature
    pub weights: Vec<Vec<f32>>,
    /// Bias per output class
    pub biases: Vec<f32>,
}

/// On-disk checkpoint of a linear classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearCheckpoint {
    /// Raw trained variables
    pub variables: LinearParams,
    /// Exponential moving averages of the variables
    #[serde(default)]
    pub moving_averages: Option<LinearParams>,
}

impl LinearCheckpoint {
    /// Read a checkpoint from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the checkpoint as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Parameters for the selected variable set
    pub fn params(&self, variables: VariableSet) -> Option<&LinearParams> {
        match variables {
            VariableSet::Trained => Some(&self.variables),
            VariableSet::Shadow { .. } => self.moving_averages.as_ref(),
        }
    }
}

/// Dense linear classifier
#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: Array2<f32>,
    biases: Array1<f32>,
    moving_average_decay: f32,
}

impl LinearModel {
    /// Create an empty model; parameters are filled by `restore`
    pub fn new(moving_average_decay: f32) -> Self {
        Self {
            weights: Array2::zeros((0, 0)),
            biases: Array1::zeros(0),
            moving_average_decay,
        }
    }

    /// Create a model with the given parameters
    pub fn from_params(params: &LinearParams, moving_average_decay: f32) -> Result<Self> {
        let (weights, biases) = to_arrays(params)?;
        Ok(Self {
            weights,
            biases,
            moving_average_decay,
        })
    }

    /// Number of input features expected
    pub fn input_dim(&self) -> usize {
        self.weights.nrows()
    }
}

fn to_arrays(params: &LinearParams) -> Result<(Array2<f32>, Array1<f32>)> {
    let rows = params.weights.len();
    let cols = params.biases.len();

    if let Some(bad) = params.weights.iter().position(|row| row.len() != cols) {
        return Err(PredictError::Model(format!(
            "weight row {} has {} columns, expected {}",
            bad,
            params.weights[bad].len(),
            cols
        )));
    }

    let flat: Vec<f32> = params.weights.iter().flatten().copied().collect();
    let weights = Array2::from_shape_vec((rows, cols), flat)?;
    let biases = Array1::from_vec(params.biases.clone());
    Ok((weights, biases))
}

impl Model for LinearModel {
    fn num_outputs(&self) -> usize {
        self.biases.len()
    }

    fn moving_average_decay(&self) -> f32 {
        self.moving_average_decay
    }

    fn restore(&mut self, checkpoint: &ResolvedCheckpoint, variables: VariableSet) -> Result<()> {
        let path = checkpoint.payload_path("json");
        let restore_err = |reason: String| PredictError::Restore {
            path: path.clone(),
            reason,
        };

        let payload = LinearCheckpoint::load(&path).map_err(|e| restore_err(e.to_string()))?;
        let params = payload
            .params(variables)
            .ok_or_else(|| restore_err(format!("checkpoint has no {}", variables)))?;
        let (weights, biases) = to_arrays(params).map_err(|e| restore_err(e.to_string()))?;

        tracing::debug!(
            "Restored {} ({}x{}) from {}",
            variables,
            weights.nrows(),
            weights.ncols(),
            path.display()
        );

        self.weights = weights;
        self.biases = biases;
        Ok(())
    }

    fn forward(&self, inputs: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        if inputs.ncols() != self.input_dim() {
            return Err(PredictError::Model(format!(
                "expected {} input features, got {}",
                self.input_dim(),
                inputs.ncols()
            )));
        }
        Ok(inputs.dot(&self.weights) + &self.biases)
    }
}
