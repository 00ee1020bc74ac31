//! Skywatch Telemetry Server – read-only status dashboard for a meteor
//! camera capture station.
//!
//! This binary:
//! 1. Validates the station log directory from the CLI
//! 2. Runs an axum HTTP server that reports what's in the logs and the
//!    nightly capture artifacts
//! 3. Serves the embedded browser dashboard that polls those endpoints

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use skywatch_server::server;

#[derive(Parser, Debug)]
#[command(name = "skywatch-server")]
#[command(about = "Status dashboard for a meteor camera capture station")]
struct Args {
    /// IP address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    ip: String,

    /// Port to bind to
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Station log directory to watch
    #[arg(short = 'd', long)]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    // Make sure we have a directory before serving anything from it.
    if !args.log_dir.exists() {
        bail!("log directory '{}' does not exist", args.log_dir.display());
    }
    let log_dir = args
        .log_dir
        .canonicalize()
        .with_context(|| format!("Cannot resolve '{}'", args.log_dir.display()))?;
    if !log_dir.is_dir() {
        bail!("log directory '{}' is not a directory", log_dir.display());
    }

    info!(
        "Skywatch Telemetry Server starting (log_dir={})",
        log_dir.display()
    );

    // ── ctrl-c ───────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::Relaxed);
        info!("Shutdown signal received");
    })
    .context("Cannot set Ctrl-C handler")?;

    // ── run HTTP server ──────────────────────────────────────────────
    let listen_addr = format!("{}:{}", args.ip, args.port);
    server::run(log_dir, &listen_addr, shutdown)
        .await
        .context("HTTP server failed")?;

    info!("Skywatch Telemetry Server stopped");
    Ok(())
}
