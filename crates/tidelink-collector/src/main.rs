// ============================================
// File: crates/tidelink-collector/src/main.rs
// ============================================
//! # Tidelink Collector Entry Point
//!
//! ## Usage
//! ```bash
//! tidelink-collector --listen 0.0.0.0:11000 --data-dir ./registos
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tidelink_collector::{Collector, CollectorError, FileStore};
use tidelink_common::Framing;
use tidelink_core::SessionFraming;
use tidelink_transport::{FrameOptions, TcpFrameListener};

/// Tidelink central collector
#[derive(Parser, Debug)]
#[command(name = "tidelink-collector")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on for aggregators
    #[arg(short, long, default_value = "0.0.0.0:11000")]
    listen: SocketAddr,

    /// Directory for per-node reading files
    #[arg(short, long, default_value = "registos")]
    data_dir: PathBuf,

    /// Largest accepted batch frame in bytes
    #[arg(long, default_value_t = 4 * 1024 * 1024)]
    max_frame_bytes: usize,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("Starting tidelink collector v{}", env!("CARGO_PKG_VERSION"));

    let store = FileStore::open(&cli.data_dir).await?;
    info!("Storing readings under {}", store.dir().display());

    let framing: Arc<dyn Framing> = Arc::new(SessionFraming);
    let options = FrameOptions::default().with_max_frame_bytes(cli.max_frame_bytes);
    let listener = TcpFrameListener::bind_addr(cli.listen, framing, options)
        .await
        .map_err(|e| CollectorError::startup_failed(format!("bind {} failed: {e}", cli.listen)))?;

    let collector = Collector::new(Arc::new(store));
    collector
        .serve(listener, async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => {
                    warn!("Cannot listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    Ok(())
}

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}
