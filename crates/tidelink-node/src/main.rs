// ============================================
// File: crates/tidelink-node/src/main.rs
// ============================================
//! # Tidelink Node Simulator
//!
//! Handshakes with an aggregator, then submits a temperature reading every
//! tick and a humidity reading on even seconds. Typing `DLG` on stdin asks
//! the aggregator to shut down and stops the simulator.
//!
//! ## Usage
//! ```bash
//! tidelink-node --id N_Wavy01 --aggregator 127.0.0.1:11001
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial simulator

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use chrono::Timelike;
use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tidelink_common::{time::now_utc, Framing, NodeId};
use tidelink_core::{Measurement, Reading, SessionFraming};
use tidelink_node::{BackoffPolicy, EdgeClient};
use tidelink_transport::{FrameOptions, TcpConnector};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tidelink edge node simulator
#[derive(Parser, Debug)]
#[command(name = "tidelink-node")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Node identifier; the prefix before `_` is its region
    #[arg(short, long)]
    id: String,

    /// Aggregator address
    #[arg(short, long, default_value = "127.0.0.1:11001")]
    aggregator: SocketAddr,

    /// Milliseconds between readings
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Give up the handshake after this many attempts (0 = never)
    #[arg(long, default_value_t = 10)]
    max_attempts: u32,

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
    let node_id = NodeId::new(cli.id.clone()).context("invalid node id")?;
    let framing: std::sync::Arc<dyn Framing> = std::sync::Arc::new(SessionFraming);
    let connector = TcpConnector::new(
        cli.aggregator,
        framing,
        FrameOptions::default(),
        CONNECT_TIMEOUT,
    );
    let client = EdgeClient::new(node_id.clone(), connector);

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let console = tokio::spawn(watch_console(stop_tx));

    let policy = BackoffPolicy {
        max_attempts: (cli.max_attempts > 0).then_some(cli.max_attempts),
        ..BackoffPolicy::default()
    };
    client
        .handshake(&policy, &mut stop_rx)
        .await
        .context("handshake failed")?;

    let mut ticker = tokio::time::interval(Duration::from_millis(cli.interval_ms.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop_rx.wait_for(|stop| *stop) => break,
            _ = ticker.tick() => {
                let reading = Reading::now(node_id.clone(), sample());
                if let Err(e) = client.send_reading(&reading).await {
                    warn!("Reading not delivered: {}", e);
                }
            }
        }
    }

    match client.request_shutdown().await {
        Ok(()) => info!("Shutdown request delivered"),
        Err(e) => warn!("Shutdown request failed: {}", e),
    }
    console.abort();
    Ok(())
}

/// One tick's worth of measurements.
fn sample() -> Vec<Measurement> {
    let mut rng = rand::thread_rng();
    let mut measurements = vec![Measurement::new(
        "temperature",
        round1(rng.gen_range(15.0..=25.0)),
    )];
    if now_utc().second() % 2 == 0 {
        measurements.push(Measurement::new("humidity", round1(rng.gen_range(0.0..=100.0))));
    }
    measurements
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Sets the stop flag when `DLG` is typed on stdin.
async fn watch_console(stop: watch::Sender<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().eq_ignore_ascii_case("DLG") {
            info!("Operator requested shutdown");
            let _ = stop.send(true);
            return;
        }
    }
    // stdin closed: keep the flag alive so the run loop is unaffected.
    stop.closed().await;
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
