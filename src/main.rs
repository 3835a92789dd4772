//! # calsync
//!
//! Command-line entry point: apply migrations, run a single sync pass, or
//! keep the scheduler running until interrupted.

use anyhow::{Context, Result, bail};
use calsync::config::ConfigLoader;
use calsync::sync::CalendarTarget;
use calsync::{db, runtime, telemetry};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "calsync")]
#[command(about = "Incrementally mirror remote calendars into a local database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Run one sync pass and print the summary as JSON
    Sync {
        /// Only sync this calendar (`id` or `id=Display Name`); repeatable
        #[arg(short, long)]
        calendar: Vec<String>,
    },
    /// Run the scheduler until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing tracing")?;

    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!(config = %redacted, "Loaded configuration");
    }
    info!(profile = %config.profile, "Configuration loaded");

    let pool = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    db::run_migrations(&pool).await?;

    match cli.command {
        Commands::Migrate => {
            info!("Migrations applied");
            Ok(())
        }
        Commands::Sync { calendar } => {
            let targets = if calendar.is_empty() {
                runtime::calendar_targets(&config)
            } else {
                calendar
                    .iter()
                    .filter_map(|entry| CalendarTarget::parse(entry))
                    .collect()
            };
            if targets.is_empty() {
                bail!("no calendars configured (set CALSYNC_CALENDAR_IDS or pass --calendar)");
            }

            let orchestrator = runtime::build_orchestrator(&config, pool)?;
            let summary = orchestrator.run_sync(&targets).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if summary.failed() > 0 {
                bail!(
                    "{} of {} calendars failed to sync",
                    summary.failed(),
                    summary.calendars.len()
                );
            }
            Ok(())
        }
        Commands::Run => {
            if runtime::calendar_targets(&config).is_empty() {
                bail!("no calendars configured (set CALSYNC_CALENDAR_IDS)");
            }
            let scheduler = runtime::build_scheduler(&config, pool)?;

            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_token.cancel();
                }
            });

            scheduler.run(shutdown).await;
            Ok(())
        }
    }
}
