//! Keystone Node - Main Binary
//!
//! Runs a partitioned identity and access-control cluster in one process.

use anyhow::Result;
use clap::{Parser, Subcommand};
use keystone_node::{KeystoneNode, NodeConfig};
use std::path::PathBuf;
use tokio::signal;
use tracing::info;

/// Keystone Node CLI
#[derive(Parser)]
#[command(name = "keystone-node")]
#[command(about = "Keystone - partitioned identity and access control")]
#[command(version)]
struct Cli {
    /// Path to configuration file; defaults apply when omitted
    #[arg(short, long, env = "KEYSTONE_CONFIG")]
    config: Option<PathBuf>,

    /// Number of partitions (overrides config)
    #[arg(short, long, env = "KEYSTONE_PARTITIONS")]
    partitions: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node (default)
    Run,

    /// Load and validate the configuration, then print it
    CheckConfig,

    /// Show node version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let config = NodeConfig::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => NodeConfig::default(),
    };
    if let Some(partitions) = cli.partitions {
        config.cluster.partitions = partitions;
    }
    config.validate()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Version => {
            println!("Keystone Node v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::CheckConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Run => run(config).await,
    }
}

async fn run(config: NodeConfig) -> Result<()> {
    info!("Starting Keystone Node v{}", env!("CARGO_PKG_VERSION"));

    let node = KeystoneNode::new(config)?;
    let shutdown = node.shutdown_token();

    tokio::spawn(async move {
        tokio::select! {
            _ = signal::ctrl_c() => info!("Received shutdown signal (Ctrl+C)"),
            _ = shutdown_signal() => info!("Received shutdown signal (SIGTERM)"),
        }
        shutdown.cancel();
    });

    node.run().await?;

    info!("Node stopped gracefully");
    Ok(())
}

/// Cross-platform shutdown signal handling
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to register SIGTERM handler");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    std::future::pending::<()>().await
}
