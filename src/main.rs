use anyhow::Context;
use api_client::AlphaVantageClient;
use clap::{Parser, Subcommand};
use configuration::{init_tracing, load_config, CliOverrides, Config};
use database::{MemoryConnector, MemoryQuoteStore, PgConnector, StoreConnector};
use pipeline::{Pipeline, PipelineConfig};
use std::process::ExitCode;
use std::sync::Arc;

mod schedule;

use schedule::{run_schedule, HourlySchedule};

/// The main entry point for the quote ingestion job.
#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse command-line arguments
    let cli = Cli::parse();

    let mut config = load_config(&cli.overrides.config)
        .with_context(|| format!("failed to load {}", cli.overrides.config.display()))?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    // Hold the guards until the process exits so buffered log lines are flushed.
    let _log_guards = init_tracing(&config.logging)?;
    tracing::debug!(config = ?config, "Configuration loaded.");

    // Execute the appropriate command
    match cli.command {
        Commands::Run(args) => {
            let pipeline = build_pipeline(&config, args.dry_run)?;
            let result = pipeline.run().await;
            println!("{}", serde_json::to_string(&result)?);
            Ok(if result.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Schedule(args) => {
            let pipeline = build_pipeline(&config, args.dry_run)?;
            let schedule = HourlySchedule::from_settings(&config.schedule)?;
            let interrupted = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C.");
                    std::future::pending::<()>().await;
                }
            };
            run_schedule(pipeline, schedule, interrupted).await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Fetches daily prices for one symbol and upserts them into PostgreSQL.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: CliOverrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once and print the result as JSON.
    Run(RunArgs),
    /// Run the pipeline every hour at the configured minute until interrupted.
    Schedule(RunArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// Keep rows in memory instead of writing to the database.
    #[arg(long)]
    dry_run: bool,
}

// ==============================================================================
// Wiring
// ==============================================================================

fn build_pipeline(config: &Config, dry_run: bool) -> anyhow::Result<Pipeline> {
    let source = AlphaVantageClient::new(&config.api).context("failed to build the API client")?;

    let connector: Arc<dyn StoreConnector> = if dry_run {
        tracing::warn!("Dry run: rows will not be written to the database.");
        Arc::new(MemoryConnector::new(MemoryQuoteStore::new()))
    } else {
        Arc::new(PgConnector::new(config.database.clone()))
    };

    Ok(Pipeline::new(PipelineConfig::from(config), Arc::new(source), connector))
}
