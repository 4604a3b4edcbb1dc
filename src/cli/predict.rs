//! Batch prediction command

use anyhow::{anyhow, Result};

use super::PredictArgs;
use crate::feed::{CsvSource, QueueFeed};
use crate::model::LinearModel;
use crate::predict::PredictionRun;

/// Run prediction over a CSV dataset and write the results
pub async fn predict(args: PredictArgs) -> Result<()> {
    let config = args.to_config()?;
    let data_path = config
        .dataset
        .data_path
        .clone()
        .ok_or_else(|| anyhow!("No dataset given, pass --data or set dataset.data_path"))?;
    let output = config.predict.predictions_path();

    tracing::info!(
        "Predicting {} ({}) from {}",
        config.dataset.name,
        config.dataset.subset,
        data_path.display()
    );

    // The run blocks on feed workers; keep it off the async executor
    let result = tokio::task::spawn_blocking(move || -> crate::Result<Option<PredictionRun>> {
        let source = CsvSource::open(&data_path, config.dataset.has_header)?;
        let feed = QueueFeed::new(source, config.dataset.subset.clone(), &config.feed)?;
        let model = LinearModel::new(config.model.moving_average_decay);
        crate::predict::predict(&config, model, feed)
    })
    .await??;

    let Some(run) = result else {
        return Ok(());
    };

    match run.predictions {
        Ok(table) => {
            table.write_csv(&output)?;
            tracing::info!(
                "Wrote {} predictions over {} classes to {} (step={})",
                table.num_rows(),
                table.num_classes(),
                output.display(),
                run.checkpoint.step
            );
        }
        Err(partial) => {
            partial.table.write_csv(&output)?;
            tracing::warn!("{}", partial);
            tracing::warn!(
                "Wrote {} partial predictions to {}",
                partial.table.num_rows(),
                output.display()
            );
        }
    }

    Ok(())
}
