//! List checkpoints command

use std::path::PathBuf;

use anyhow::Result;

use crate::loader::{list_checkpoints, resolve_checkpoint};

/// List the checkpoints in a directory, oldest first
pub async fn list(dir: PathBuf) -> Result<()> {
    if !dir.is_dir() {
        println!("No checkpoint directory found at: {}", dir.display());
        return Ok(());
    }

    let checkpoints = list_checkpoints(&dir)?;
    if checkpoints.is_empty() {
        println!("No checkpoints found in {}", dir.display());
        return Ok(());
    }

    // The one prediction would restore from
    let current = resolve_checkpoint(&dir).ok().map(|c| c.path);

    println!("Checkpoints in {}:\n", dir.display());
    for checkpoint in checkpoints {
        let marker = if current.as_ref() == Some(&checkpoint.path) {
            " (current)"
        } else {
            ""
        };
        println!(
            "  step {:>8}  {}{}",
            checkpoint.step,
            checkpoint.path.display(),
            marker
        );
    }

    Ok(())
}
