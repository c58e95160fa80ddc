// Bourse broadcast worker
//
// Design Decision: Every replica runs the same scheduler; the lock row picks one per tick.
// Design Decision: A crashed holder leaves its lock row behind; `lock release` clears it.

mod database;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use bourse_broadcast::{
    BroadcastConfig, BroadcastPipeline, BroadcastScheduler, LockStore, PostgresBroadcastStore,
    RunOutcome,
};
use clap::{Parser, Subcommand};

use crate::database::DatabaseConfig;
use crate::telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser)]
#[command(name = "bourse-worker")]
#[command(about = "Instant-message broadcast worker")]
#[command(version)]
pub struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Read replica URL for eventually consistent reads
    #[arg(long, env = "DATABASE_REPLICA_URL")]
    pub database_replica_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted (default)
    Run,

    /// Run the pipeline once and print the report
    RunOnce,

    /// Inspect or clear the job lock
    Lock {
        #[command(subcommand)]
        command: LockCommand,
    },

    /// Apply database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum LockCommand {
    /// Show the current lock holder
    Status,

    /// Remove the lock row, e.g. after a worker crashed while holding it
    Release,
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loaded environment from {}", path.display());
    }

    let telemetry_config = TelemetryConfig::from_env();
    init_telemetry(&telemetry_config);

    let cli = Cli::parse();
    let config = BroadcastConfig::from_env();
    let database = DatabaseConfig::from_env(cli.database_url, cli.database_replica_url);
    let store = Arc::new(database.connect().await?);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(store, config).await,
        Commands::RunOnce => run_once(store, config).await,
        Commands::Lock { command } => lock(store, &config, command).await,
        Commands::Migrate => {
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Migrations applied");
            Ok(())
        }
    }
}

async fn run(store: Arc<PostgresBroadcastStore>, config: BroadcastConfig) -> Result<()> {
    store.migrate().await.context("Failed to run migrations")?;

    tracing::info!(
        worker_id = %config.worker_id,
        job = %config.job_name,
        interval_ms = config.poll_interval.as_millis() as u64,
        retention_ms = config.retention.as_millis() as u64,
        "Starting broadcast worker"
    );

    let pipeline = Arc::new(BroadcastPipeline::from_store(store, &config));
    let scheduler = BroadcastScheduler::new(pipeline, config.poll_interval);
    scheduler.start()?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Received shutdown signal");

    scheduler.stop().await?;
    tracing::info!("Worker shutdown complete");
    Ok(())
}

async fn run_once(store: Arc<PostgresBroadcastStore>, config: BroadcastConfig) -> Result<()> {
    let pipeline = BroadcastPipeline::from_store(store, &config);

    match pipeline.run().await.context("Pipeline run failed")? {
        RunOutcome::Completed(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        RunOutcome::Skipped => {
            println!("Skipped: job {} is locked by another run", config.job_name);
        }
    }
    Ok(())
}

async fn lock(
    store: Arc<PostgresBroadcastStore>,
    config: &BroadcastConfig,
    command: LockCommand,
) -> Result<()> {
    match command {
        LockCommand::Status => match store.get(&config.job_name).await? {
            Some(lock) => {
                println!(
                    "{} held by {} ({}) since {}",
                    lock.job_name,
                    lock.holder,
                    lock.task,
                    lock.acquired_at.to_rfc3339()
                );
            }
            None => println!("{} is not locked", config.job_name),
        },
        LockCommand::Release => {
            let held = store.get(&config.job_name).await?;
            store
                .release(&config.job_name)
                .await
                .context("Failed to release lock")?;
            match held {
                Some(lock) => {
                    tracing::warn!(job = %lock.job_name, holder = %lock.holder, "Lock released manually");
                    println!("Released {} (was held by {})", lock.job_name, lock.holder);
                }
                None => println!("{} was not locked", config.job_name),
            }
        }
    }
    Ok(())
}
