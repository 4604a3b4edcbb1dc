//! Model abstraction
//!
//! The numeric engine behind a classifier is external to litterbox. It is
//! reached through the `Model` trait: restore parameters from a resolved
//! checkpoint, then map an input batch to raw logits. `PredictionHead`
//! turns those logits into class probabilities.

mod head;
mod linear;

pub use head::{softmax_rows, PredictionHead};
pub use linear::{LinearCheckpoint, LinearModel, LinearParams};

use std::fmt;

use ndarray::{Array2, ArrayView2};

use crate::error::Result;
use crate::loader::ResolvedCheckpoint;

/// Which parameter snapshot to restore from a checkpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableSet {
    /// The raw trained variables
    Trained,
    /// Exponential moving averages of the trained variables
    Shadow {
        /// Decay the averages were maintained with
        decay: f32,
    },
}

impl VariableSet {
    /// Pick the snapshot to restore
    ///
    /// A configured decay switches to the shadow variables; the decay value
    /// itself comes from the model, which is what training used.
    pub fn select(configured_decay: Option<f32>, model_decay: f32) -> Self {
        match configured_decay {
            Some(_) => VariableSet::Shadow { decay: model_decay },
            None => VariableSet::Trained,
        }
    }

    /// Check if the shadow variables are selected
    pub fn is_shadow(&self) -> bool {
        matches!(self, VariableSet::Shadow { .. })
    }
}

impl fmt::Display for VariableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableSet::Trained => write!(f, "trained variables"),
            VariableSet::Shadow { decay } => write!(f, "moving averages (decay={})", decay),
        }
    }
}

/// A classifier backed by an external execution engine
pub trait Model: Send {
    /// Width of the raw output (logits) row; valid after `restore`
    fn num_outputs(&self) -> usize;

    /// Moving-average decay the model was trained with
    fn moving_average_decay(&self) -> f32;

    /// Load parameters from a checkpoint
    fn restore(&mut self, checkpoint: &ResolvedCheckpoint, variables: VariableSet) -> Result<()>;

    /// Compute logits for a batch, one row per input row
    fn forward(&self, inputs: ArrayView2<'_, f32>) -> Result<Array2<f32>>;
}

/// Boxed model for callers choosing the engine at runtime
pub type BoxedModel = Box<dyn Model>;

impl<M: Model + ?Sized> Model for Box<M> {
    fn num_outputs(&self) -> usize {
        (**self).num_outputs()
    }

    fn moving_average_decay(&self) -> f32 {
        (**self).moving_average_decay()
    }

    fn restore(&mut self, checkpoint: &ResolvedCheckpoint, variables: VariableSet) -> Result<()> {
        (**self).restore(checkpoint, variables)
    }

    fn forward(&self, inputs: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        (**self).forward(inputs)
    }
}
