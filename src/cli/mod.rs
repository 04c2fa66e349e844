//! Command-line interface for driftsync.
//!
//! `sync` runs the read-write daemon until interrupted; `inspect` runs one
//! read-only planning pass; `config` prints the resolved configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::{
    status_report, BaseController, ControllerError, ReadOnlyController, ReadWriteController,
};

/// driftsync - registry-driven infrastructure sync controller
#[derive(Parser, Debug)]
#[command(name = "driftsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file (default: ./driftsync.yaml)
    #[arg(short, long, global = true, env = "DRIFTSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Keep infrastructure converged with the registry until interrupted
    Sync,

    /// Plan every task once without changing infrastructure
    Inspect,

    /// Show the resolved configuration (debug)
    Config,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match self.command {
            Commands::Sync => run_sync(config).await,
            Commands::Inspect => run_inspect(config).await,
            Commands::Config => {
                println!("{:#?}", config);
                Ok(())
            }
        }
    }
}

/// Wire ctrl-c to the shutdown signal every blocking call selects against
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn run_sync(config: Config) -> Result<()> {
    let tasks = config.tasks.clone();

    let mut base = BaseController::new(&config)?;
    base.init().await.context("controller startup failed")?;

    let controller = ReadWriteController::new(base);
    let store = controller.store();

    let shutdown = shutdown_signal();
    let mut outcomes = controller.run(shutdown);

    // Drain per-cycle outcomes until every unit loop has exited.
    while let Some(outcome) = outcomes.recv().await {
        match outcome {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!("{}", e),
        }
    }

    let (overall, statuses) = status_report(&tasks, &store);
    info!(status = ?overall.status, "controller stopped");
    for ts in statuses {
        info!(task = %ts.task_name, status = ?ts.status, events = ts.events.len(), "task status");
    }

    Ok(())
}

async fn run_inspect(mut config: Config) -> Result<()> {
    // Surface the backend's plan output on stdout in inspect mode.
    config.terraform.log_output = true;

    let mut base = BaseController::new(&config)?;
    base.init().await.context("controller startup failed")?;

    let mut controller = ReadOnlyController::new(base);
    let mut shutdown = shutdown_signal();

    match controller.run(&mut shutdown).await {
        Ok(()) => Ok(()),
        Err(ControllerError::Cancelled) => {
            warn!("inspection interrupted");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
