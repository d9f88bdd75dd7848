//! qscaled — the QScale daemon.
//!
//! Single binary that assembles the autoscaler:
//! - Prometheus metrics source (observations)
//! - Learning agent (replay memory, value network, policy)
//! - Actuation handoff + convergence wait
//! - The sequential control loop
//!
//! # Usage
//!
//! ```text
//! qscaled init --path qscale.toml
//! qscaled run --config qscale.toml
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use qscale_core::QscaleConfig;
use qscale_metrics::PrometheusSource;

#[derive(Parser)]
#[command(name = "qscaled", about = "QScale daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control loop until interrupted.
    Run {
        /// Path to the qscale.toml config file.
        #[arg(long, default_value = "qscale.toml")]
        config: PathBuf,
    },
    /// Write a default qscale.toml to get started.
    Init {
        /// Where to write the scaffolded config.
        #[arg(long, default_value = "qscale.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,qscale=debug,qscaled=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => run(config).await,
        Command::Init { path } => init(path),
    }
}

async fn run(config_path: PathBuf) -> anyhow::Result<()> {
    info!("QScale daemon starting");

    let config = QscaleConfig::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!(path = %config_path.display(), "config loaded");

    // ── Initialize subsystems ──────────────────────────────────

    let source = PrometheusSource::new(&config.metrics)
        .context("building metrics source")?;
    info!(url = %config.metrics.prometheus_url, "metrics source initialized");

    let mut control = qscale_control::ControlLoop::new(&config, source)
        .context("building control loop")?;
    info!(
        handoff = %config.scaling.handoff_path,
        max_replicas = config.scaling.max_replicas,
        "control loop initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let loop_handle = tokio::spawn(async move {
        control.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C handler");
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = loop_handle.await;
    info!("qscaled stopped");
    Ok(())
}

fn init(path: PathBuf) -> anyhow::Result<()> {
    let config = QscaleConfig::scaffold();
    let rendered = config
        .to_toml_string()
        .context("rendering default config")?;
    std::fs::write(&path, rendered)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
