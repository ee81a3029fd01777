//! microseed
//!
//! A service skeleton: configuration, logging, Postgres, Redis and an HTTP
//! router wired together by a dependency-injection container.
//!
//! # Architecture Overview
//!
//! ```text
//!   microseed [--config PATH] <command>
//!        │
//!        ├─ load config (TOML + env) ─▶ install logging + OTLP export
//!        │                              (root span: service, env)
//!        │
//!        ├─ serve ───────▶ app::module  ─▶ resolve ─▶ Runner::run
//!        │                                            start hooks
//!        │                                            wait for SIGINT/SIGTERM
//!        │                                            stop hooks (grace period)
//!        │
//!        ├─ migrate ... ─▶ app::tooling ─▶ resolve ─▶ Runner::execute(migrate)
//!        └─ seed ──────▶ app::tooling ─▶ resolve ─▶ Runner::execute(seed)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::Instrument;

use microseed::config::load_config;
use microseed::container::BoxError;
use microseed::db::Database;
use microseed::lifecycle::{signals, RunError, Runner};
use microseed::observability::{logging, TraceExport};
use microseed::{app, migrate, seed, AppConfig};

#[derive(Debug, Parser)]
#[command(name = "microseed", version, about = "Service skeleton with pluggable routes")]
struct Cli {
    /// TOML config file; environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API server.
    Serve,

    /// Database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),

    /// Insert sample data.
    Seed,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum MigrateCommand {
    /// Apply all pending migrations.
    Up,

    /// Revert the most recent migrations.
    Down {
        /// Number of migrations to revert.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        step: u32,
    },

    /// Revert every migration.
    Reset,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Exiting with error");
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<RunError>()
                .map(RunError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref()).context("loading configuration")?;
    let telemetry = logging::init(&config).context("initialising logging")?;
    let config = Arc::new(config);

    execute(cli.command, config, telemetry.traces())
        .instrument(telemetry.root_span())
        .await
}

async fn execute(
    command: Command,
    config: Arc<AppConfig>,
    traces: &TraceExport,
) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), ?command, "Starting");

    // The export module goes first so its flush is the last stop hook.
    match command {
        Command::Serve => {
            let container = app::build(config, |registry| {
                registry.include(traces.module()).include(app::module);
            })?;
            Runner::run(container, signals::termination()).await?;
        }
        Command::Migrate(migration) => {
            let container = app::build(config, |registry| {
                registry.include(traces.module()).include(app::tooling);
            })?;
            Runner::execute(container, |c| run_migration(c.get::<Database>(), migration)).await?;
        }
        Command::Seed => {
            let container = app::build(config, |registry| {
                registry.include(traces.module()).include(app::tooling);
            })?;
            Runner::execute(container, |c| run_seed(c.get::<Database>())).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_migration(
    db: Option<Arc<Database>>,
    command: MigrateCommand,
) -> Result<(), BoxError> {
    let db = db.ok_or("database component missing")?;
    match command {
        MigrateCommand::Up => migrate::up(&db).await?,
        MigrateCommand::Down { step } => migrate::down(&db, step).await?,
        MigrateCommand::Reset => migrate::reset(&db).await?,
    }
    Ok(())
}

async fn run_seed(db: Option<Arc<Database>>) -> Result<(), BoxError> {
    let db = db.ok_or("database component missing")?;
    seed::seed_all(&db).await?;
    Ok(())
}
