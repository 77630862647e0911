// ============================================
// File: crates/tidelink-aggregator/src/main.rs
// ============================================
//! # Tidelink Aggregator Entry Point
//!
//! ## Creation Reason
//! Binary for one regional aggregator.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration and registry loading
//! - Console `DLG` watch and aggregator execution
//!
//! ## Usage
//! ```bash
//! tidelink-aggregator start --config /etc/tidelink/aggregator.toml
//! tidelink-aggregator start --id N_Agr --listen 0.0.0.0:11001
//! tidelink-aggregator validate --config aggregator.toml
//! tidelink-aggregator init > aggregator.toml
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `RUST_LOG` overrides `logging.level`
//! - Typing `DLG` on stdin stops the aggregator gracefully
//! - Exit code 2 means a configuration error, 1 any other failure
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tidelink_aggregator::config::ConfigOverrides;
use tidelink_aggregator::shutdown::watch_console;
use tidelink_aggregator::{Aggregator, AggregatorConfig, AggregatorError};

// ============================================
// CLI Definition
// ============================================

/// Tidelink regional aggregator
#[derive(Parser, Debug)]
#[command(name = "tidelink-aggregator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the aggregator
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = "aggregator.toml")]
        config: PathBuf,

        /// Aggregator id, overrides the file (e.g. N_Agr)
        #[arg(long)]
        id: Option<String>,

        /// Listen address, overrides the file
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Validate configuration file and registries
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "aggregator.toml")]
        config: PathBuf,
    },

    /// Print a default configuration file
    Init,
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging("info");

    let result = match cli.command {
        Commands::Start { config, id, listen } => cmd_start(config, id, listen).await,
        Commands::Validate { config } => cmd_validate(config).await,
        Commands::Init => {
            print!("{}", AggregatorConfig::default().to_toml());
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        let config_error = e
            .downcast_ref::<AggregatorError>()
            .is_some_and(AggregatorError::is_config_error);
        if config_error {
            error!("Check the configuration with `tidelink-aggregator validate`");
            std::process::exit(2);
        }
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Starts the aggregator.
async fn cmd_start(
    config_path: PathBuf,
    id: Option<String>,
    listen: Option<SocketAddr>,
) -> anyhow::Result<()> {
    let overrides = ConfigOverrides {
        id,
        listen_addr: listen,
    };
    let config = load_or_default_config(&config_path, &overrides).await?;

    init_logging(&config.logging.level);

    let aggregator = Aggregator::from_config(config).await?;

    info!("════════════════════════════════════════");
    info!("Aggregator: {}", aggregator.context().id);
    info!("Listen:     {}", aggregator.config().aggregator.listen_addr);
    info!("Collector:  {}", aggregator.config().collector.addr);
    info!("Type DLG and press Enter to stop");
    info!("════════════════════════════════════════");

    let console = tokio::spawn(watch_console(
        BufReader::new(tokio::io::stdin()),
        aggregator.shutdown_handle(),
    ));

    let result = aggregator.run().await;
    console.abort();
    result?;

    Ok(())
}

/// Validates configuration file and registries.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    let config = AggregatorConfig::load(&config_path).await?;
    let aggregator = Aggregator::from_config(config).await?;
    let config = aggregator.config();

    println!("✅ Configuration is valid");
    println!();
    println!("Aggregator:");
    println!("   Id:         {}", aggregator.context().id);
    println!("   Region:     {}", aggregator.context().region());
    println!("   Listen:     {}", config.aggregator.listen_addr);
    println!();
    println!("Collector:");
    println!("   Address:    {}", config.collector.addr);
    println!("   Timeout:    {}s", config.collector.forward_timeout_secs);
    println!();
    println!("Batching:");
    println!("   Interval:   {}s", config.batching.interval_secs);
    println!();
    println!("Limits:");
    println!("   Max Connections:  {}", config.limits.max_connections);
    println!("   Read Timeout:     {}s", config.limits.frame_read_timeout_secs);

    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

/// Loads config, or defaults when the file does not exist.
async fn load_or_default_config(
    path: &Path,
    overrides: &ConfigOverrides,
) -> anyhow::Result<AggregatorConfig> {
    if path.exists() {
        return Ok(AggregatorConfig::load_with(path, overrides).await?);
    }

    info!("Config file {} not found, using defaults", path.display());
    let mut config = AggregatorConfig::default();
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}
