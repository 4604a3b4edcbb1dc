//! Checkpoint info command

use std::path::PathBuf;

use anyhow::Result;

use crate::loader::resolve_checkpoint;
use crate::model::{LinearCheckpoint, LinearParams};

/// Show checkpoint information
pub async fn info(checkpoint: PathBuf) -> Result<()> {
    let resolved = resolve_checkpoint(&checkpoint)?;

    println!("Checkpoint: {}\n", checkpoint.display());
    println!("Path: {}", resolved.path.display());
    println!("Step: {}", resolved.step);

    let payload_path = resolved.payload_path("json");
    let payload = match LinearCheckpoint::load(&payload_path) {
        Ok(payload) => payload,
        Err(e) => {
            println!("\nPayload: unreadable ({})", e);
            return Ok(());
        }
    };

    println!("\nVariable sets:");
    print_params("trained", Some(&payload.variables));
    print_params("moving averages", payload.moving_averages.as_ref());

    if let Ok(metadata) = std::fs::metadata(&payload_path) {
        let size_kb = metadata.len() as f64 / 1024.0;
        if size_kb >= 1024.0 {
            println!("\nFile size: {:.2} MB", size_kb / 1024.0);
        } else {
            println!("\nFile size: {:.2} KB", size_kb);
        }
    }

    Ok(())
}

fn print_params(label: &str, params: Option<&LinearParams>) {
    match params {
        Some(params) => println!(
            "  {}: {} inputs, {} classes",
            label,
            params.weights.len(),
            params.biases.len()
        ),
        None => println!("  {}: absent", label),
    }
}
