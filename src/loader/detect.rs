//! Checkpoint resolution
//!
//! A checkpoint path may name a file, a checkpoint prefix (`model.ckpt-100`
//! with files such as `model.ckpt-100.json` next to it), or a training
//! directory. Directories are resolved through their `checkpoint` state file
//! first and fall back to the newest `*.ckpt-<step>` file.

use std::path::{Path, PathBuf};

use crate::error::{PredictError, Result};

/// Name of the state file pointing at the latest checkpoint in a directory
pub const STATE_FILE: &str = "checkpoint";

const STATE_KEY: &str = "model_checkpoint_path";

/// Marker preceding the step in a checkpoint name
const STEP_MARKER: &str = ".ckpt-";

/// A concrete checkpoint and the training step it was taken at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCheckpoint {
    /// Path to the checkpoint file or prefix
    pub path: PathBuf,
    /// Global step parsed from the checkpoint name (0 when absent)
    pub step: u64,
}

impl ResolvedCheckpoint {
    fn from_path(path: PathBuf) -> Self {
        let step = parse_step(&path).unwrap_or(0);
        Self { path, step }
    }
}

/// Resolve a checkpoint path to a concrete snapshot
///
/// Returns `PredictError::CheckpointNotFound` when nothing usable exists.
pub fn resolve_checkpoint<P: AsRef<Path>>(path: P) -> Result<ResolvedCheckpoint> {
    let path = path.as_ref();

    if path.is_dir() {
        resolve_in_directory(path)
    } else if path.is_file() || prefix_exists(path) {
        Ok(ResolvedCheckpoint::from_path(path.to_path_buf()))
    } else {
        Err(not_found(path))
    }
}

/// List every checkpoint file in a directory, oldest step first
pub fn list_checkpoints<P: AsRef<Path>>(dir: P) -> Result<Vec<ResolvedCheckpoint>> {
    let dir = dir.as_ref();
    let pattern = dir.join("*.ckpt-*");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| PredictError::Checkpoint(format!("non-UTF-8 path: {}", dir.display())))?;

    let paths = glob::glob(pattern).map_err(|e| PredictError::Checkpoint(e.to_string()))?;

    let mut found: Vec<ResolvedCheckpoint> = paths
        .filter_map(|p| p.ok())
        .filter(|p| p.is_file() && parse_step(p).is_some())
        .map(ResolvedCheckpoint::from_path)
        .collect();

    found.sort_by(|a, b| a.step.cmp(&b.step).then_with(|| a.path.cmp(&b.path)));
    Ok(found)
}

/// Parse the global step from a checkpoint name (`model.ckpt-1234.json` -> 1234)
///
/// The step follows the `.ckpt-` marker, so shard suffixes such as
/// `.data-00000-of-00001` are ignored. Names without the marker use the
/// digits after their last `-`.
pub fn parse_step(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let tail = match name.rfind(STEP_MARKER) {
        Some(at) => &name[at + STEP_MARKER.len()..],
        None => name.rsplit_once('-')?.1,
    };
    let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn resolve_in_directory(dir: &Path) -> Result<ResolvedCheckpoint> {
    if let Some(name) = read_state_file(dir)? {
        let candidate = if name.is_absolute() {
            name
        } else {
            dir.join(name)
        };

        if candidate.is_file() || prefix_exists(&candidate) {
            return Ok(ResolvedCheckpoint::from_path(candidate));
        }

        tracing::debug!(
            "State file points at missing checkpoint {}, scanning directory",
            candidate.display()
        );
    }

    list_checkpoints(dir)?
        .pop()
        .ok_or_else(|| not_found(dir))
}

/// Read `model_checkpoint_path` from the directory's state file, if present
fn read_state_file(dir: &Path) -> Result<Option<PathBuf>> {
    let state_path = dir.join(STATE_FILE);
    if !state_path.is_file() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&state_path)?;
    for line in content.lines() {
        if let Some(value) = line.trim().strip_prefix(STATE_KEY) {
            let value = value.trim_start().trim_start_matches(':').trim();
            let value = value.trim_matches('"');
            if value.is_empty() {
                break;
            }
            return Ok(Some(PathBuf::from(value)));
        }
    }

    Err(PredictError::Checkpoint(format!(
        "state file {} has no {} entry",
        state_path.display(),
        STATE_KEY
    )))
}

/// Check whether files exist for a checkpoint prefix
fn prefix_exists(prefix: &Path) -> bool {
    let Some(prefix) = prefix.to_str() else {
        return false;
    };
    let pattern = format!("{}.*", glob::Pattern::escape(prefix));
    glob::glob(&pattern)
        .map(|mut paths| paths.next().is_some())
        .unwrap_or(false)
}

fn not_found(path: &Path) -> PredictError {
    PredictError::CheckpointNotFound {
        path: path.to_path_buf(),
    }
}
