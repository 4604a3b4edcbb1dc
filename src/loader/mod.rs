//! Checkpoint loading utilities
//!
//! This module locates persisted model snapshots. Reading parameters out of
//! a snapshot is left to the model implementation, which receives the
//! resolved checkpoint through `Model::restore`.

mod detect;

pub use detect::{list_checkpoints, parse_step, resolve_checkpoint, ResolvedCheckpoint, STATE_FILE};

use std::path::PathBuf;

impl ResolvedCheckpoint {
    /// File holding the checkpoint payload with the given extension
    ///
    /// A checkpoint that is already a file is returned as is; a prefix
    /// such as `model.ckpt-100` maps to `model.ckpt-100.<extension>`.
    pub fn payload_path(&self, extension: &str) -> PathBuf {
        if self.path.is_file() {
            return self.path.clone();
        }
        let mut name = self.path.clone().into_os_string();
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    }
}
