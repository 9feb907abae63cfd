//! Demand forecaster - Main Entry Point
//!
//! Trains, forecasts and serves hourly electricity demand predictions.

use clap::Parser;
use demand_forecast::cli::{cmd_forecast, cmd_info, cmd_serve, cmd_train, resolve_config, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "demand_forecast=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Train { splits, test_size, gap, pass_through, n_estimators, format } => {
            tokio::task::spawn_blocking(move || {
                cmd_train(config, splits, test_size, gap, pass_through, n_estimators, format)
            })
            .await??;
        }
        Commands::Forecast { start, end, output } => {
            tokio::task::spawn_blocking(move || cmd_forecast(config, &start, &end, output.as_deref())).await??;
        }
        Commands::Info => {
            cmd_info(config)?;
        }
        Commands::Serve { port, host } => {
            cmd_serve(config, host, port).await?;
        }
    }

    Ok(())
}
