//! Roster assigner
//!
//! Administrative entry point for the assignment engine: fills an event's
//! roster, applies migrations, or checks database connectivity.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use roster_assigner::{
    allocation::{AssignmentOutcome, Assigner, RunMode},
    config,
    db::Database,
};
use roster_id::EventId;
use tabled::{Table, Tabled};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Assign volunteers to scheduled events.
#[derive(Debug, Parser)]
#[command(name = "assigner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fill an event up to its required headcount.
    Assign {
        /// Event ID (evt_...).
        event_id: EventId,

        /// Run the selection, report it, and discard all writes.
        #[arg(long)]
        dry_run: bool,

        /// Output format.
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Apply database migrations.
    Migrate,

    /// Check that the database is reachable.
    Check,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Tabled)]
struct PickRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "CANDIDATE")]
    candidate_id: String,
    #[tabled(rename = "SCORE")]
    score: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to ROSTER_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let db = match Database::connect(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return Err(e.into());
        }
    };

    match cli.command {
        Commands::Migrate => {
            db.run_migrations().await?;
        }
        Commands::Check => {
            db.health_check().await?;
            info!("Database is reachable");
            println!("ok");
        }
        Commands::Assign {
            event_id,
            dry_run,
            format,
        } => {
            let mode = if dry_run { RunMode::DryRun } else { RunMode::Commit };
            let assigner = Assigner::new(db.assignment_store(), config.weights.clone());
            let outcome = assigner
                .run_with_retry(event_id, mode, config.retry)
                .await
                .with_context(|| format!("assignment for event {event_id} failed"))?;
            print_outcome(&outcome, format)?;
        }
    }

    Ok(())
}

fn print_outcome(outcome: &AssignmentOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome)?);
        }
        OutputFormat::Table => {
            println!(
                "{} ({}) on {}: {} of {} assigned, {:?}{}",
                outcome.event_name,
                outcome.event_id,
                outcome.event_date,
                outcome.assigned_total(),
                outcome.required_headcount,
                outcome.termination,
                if outcome.committed { "" } else { " [dry run]" }
            );
            if !outcome.picks.is_empty() {
                let rows = outcome
                    .picks
                    .iter()
                    .enumerate()
                    .map(|(i, pick)| PickRow {
                        position: i + 1,
                        candidate_id: pick.candidate_id.to_string(),
                        score: format!("{:.2}", pick.score),
                    });
                println!("{}", Table::new(rows));
            }
            if !outcome.conflicts.is_empty() {
                println!("skipped (assigned concurrently): {}", outcome.conflicts.len());
            }
            if outcome.shortfall() > 0 {
                println!("still missing: {}", outcome.shortfall());
            }
        }
    }
    Ok(())
}
