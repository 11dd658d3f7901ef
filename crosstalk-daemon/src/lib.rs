//! # Crosstalk Daemon
//!
//! The binary that wires everything together: it parses the CLI, loads the
//! configuration, initializes logging, attaches the configured transports
//! to a fresh [`BridgeManager`] and runs the event loop until it stops on
//! its own or Ctrl-C asks every bridge to detach.

pub mod cli;
pub mod config;

use anyhow::Result;
use clap::Parser;
use crosstalk_console::ConsoleBridge;
use crosstalk_core::event::EventPayload;
use crosstalk_core::manager::BridgeManager;
use crosstalk_core::target;
use crosstalk_logger::logging;
use tokio::signal;

use cli::{Cli, Commands};
use config::{load_config, DaemonConfig};

/// The main entry point for the daemon application logic.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let Commands::Run(run_cmd) = cli.command;
    let config = match run_cmd.config {
        Some(path) => load_config(&path)?,
        None => DaemonConfig::default(),
    };
    logging::init(&config.log)?;
    tracing::info!(config = ?config, "configuration loaded");

    run_bridge(config).await
}

/// Builds the manager, attaches the transports, and supervises the loop.
async fn run_bridge(config: DaemonConfig) -> Result<()> {
    let mut manager = BridgeManager::new();
    if config.eavesdrop {
        manager.set_eavesdropper(|event| tracing::trace!(event = %event, "bus"));
    }

    manager.attach("console", Box::new(ConsoleBridge::new(config.console)))?;

    let manager_id = manager.id();
    let handle = manager.handle();
    let mut bus = tokio::spawn(manager.run());

    tokio::select! {
        result = &mut bus => {
            result??;
            tracing::info!("bus stopped");
        }
        _ = signal::ctrl_c() => {
            tracing::info!("received Ctrl+C, broadcasting shutdown");
            handle.send(manager_id, target::ALL_BRIDGES, EventPayload::Shutdown);
            bus.await??;
            tracing::info!("shutdown complete");
        }
    }
    Ok(())
}
