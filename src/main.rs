use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use litterbox::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "litterbox=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Predict(args) => {
            litterbox::cli::predict(args).await?;
        }
        Commands::Info { checkpoint } => {
            litterbox::cli::info(checkpoint).await?;
        }
        Commands::List { dir } => {
            litterbox::cli::list(dir).await?;
        }
    }

    Ok(())
}
