// courtcast entry point.
//
// 1. Parse the command line and initialize tracing
// 2. Load config (copying defaults on first run)
// 3. Run the subcommand; each one opens the store for as long as it needs it

mod cli;
mod commands;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing::info;

use courtcast_core::config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let config = config::load_config(&cli.base_dir).context("failed to load configuration")?;

    let today = Local::now().date_naive();
    match cli.command {
        Commands::Scrape { date } => {
            let summary = commands::scrape(&config, date.unwrap_or(today)).await?;
            if !summary.failures.is_empty() {
                info!("{} sources skipped; rerun `scrape` to retry them", summary.failures.len());
            }
        }
        Commands::DeriveInjuries => {
            commands::derive_injuries(&config)?;
        }
        Commands::Train => {
            let outcome = commands::train(&config)?;
            info!(
                "trained on {} rows with {} trees",
                outcome.rows,
                outcome.model.n_trees()
            );
        }
        Commands::Predict { date } => {
            let rows = commands::predict(&config, date.unwrap_or(today))?;
            for row in rows.iter().take(10) {
                info!(
                    "{}: {:.2} vs line {:.2} (PPG {:.2})",
                    row.player, row.predicted_points, row.line, row.ppg
                );
            }
        }
    }
    Ok(())
}

const DEFAULT_FILTER: &str = "courtcast_app=info,courtcast_core=info,courtcast_ingest=info,warn";

/// Log to stderr; `RUST_LOG` overrides the default filter.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
