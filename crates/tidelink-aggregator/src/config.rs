// ============================================
// File: crates/tidelink-aggregator/src/config.rs
// ============================================
//! # Aggregator Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the regional aggregator,
//! loaded from a TOML file with CLI overrides.
//!
//! ## Main Functionality
//! - `AggregatorConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation (identity, limits, timings)
//! - Duration helpers for the runtime
//!
//! ## Configuration Sections
//! - `aggregator`: Identity (region-prefixed id) and listen address
//! - `collector`: Central collector endpoint and forward timeout
//! - `batching`: Flush interval
//! - `limits`: Concurrency and per-frame limits
//! - `shutdown`: Drain deadline and peer shutdown policy
//! - `registry`: Optional CSV registries
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [aggregator]
//! id = "N_Agr"
//! listen_addr = "0.0.0.0:11001"
//!
//! [collector]
//! addr = "127.0.0.1:11000"
//! forward_timeout_secs = 10
//!
//! [batching]
//! interval_secs = 5
//!
//! [registry]
//! aggregators_csv = "config_agr.csv"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require restart
//! - An id without a region prefix is fatal: the aggregator could
//!   not decide which nodes to admit
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use tidelink_common::AggregatorId;

use crate::error::{AggregatorError, Result};

// ============================================
// AggregatorConfig
// ============================================

/// Main aggregator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Identity and listener.
    #[serde(default)]
    pub aggregator: IdentityConfig,

    /// Central collector endpoint.
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Batch scheduling.
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Shutdown behaviour.
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Optional CSV registries.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AggregatorConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, &ConfigOverrides::default()).await
    }

    /// Loads configuration from a TOML file, applying `overrides` before
    /// validation.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load_with(path: impl AsRef<Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AggregatorError::config_load(&path_str, e.to_string()))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| AggregatorError::config_load(&path_str, e.to_string()))?;

        overrides.apply(&mut config);
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the content cannot be parsed or validated.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AggregatorError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns the first invalid or missing field.
    pub fn validate(&self) -> Result<()> {
        self.aggregator.validate()?;
        self.collector.validate()?;
        self.batching.validate()?;
        self.limits.validate()?;
        self.shutdown.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Parsed aggregator identity.
    ///
    /// # Errors
    /// Returns a config error if the id is missing or has no region.
    pub fn aggregator_id(&self) -> Result<AggregatorId> {
        self.aggregator.parsed_id()
    }
}

// ============================================
// ConfigOverrides
// ============================================

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Replaces `aggregator.id`.
    pub id: Option<String>,
    /// Replaces `aggregator.listen_addr`.
    pub listen_addr: Option<SocketAddr>,
}

impl ConfigOverrides {
    /// Writes the set values into `config`.
    pub fn apply(&self, config: &mut AggregatorConfig) {
        if let Some(id) = &self.id {
            config.aggregator.id.clone_from(id);
        }
        if let Some(addr) = self.listen_addr {
            config.aggregator.listen_addr = addr;
        }
    }
}

// ============================================
// IdentityConfig
// ============================================

/// Aggregator identity section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Aggregator id, `<REGION>_<name>`.
    #[serde(default)]
    pub id: String,

    /// TCP listen address for edge nodes.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 11001))
}

impl IdentityConfig {
    fn validate(&self) -> Result<()> {
        self.parsed_id()?;
        Ok(())
    }

    fn parsed_id(&self) -> Result<AggregatorId> {
        if self.id.trim().is_empty() {
            return Err(AggregatorError::config_missing("aggregator.id"));
        }
        AggregatorId::new(self.id.trim())
            .map_err(|e| AggregatorError::config_invalid("aggregator.id", e.to_string()))
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            listen_addr: default_listen_addr(),
        }
    }
}

// ============================================
// CollectorConfig
// ============================================

/// Central collector section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Collector address.
    #[serde(default = "default_collector_addr")]
    pub addr: SocketAddr,

    /// Time allowed for connect + send + ack of one batch.
    #[serde(default = "default_forward_timeout")]
    pub forward_timeout_secs: u64,

    /// Send a shutdown notice to the collector when stopping.
    #[serde(default = "default_true")]
    pub notify_on_shutdown: bool,
}

fn default_collector_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 11000))
}

fn default_forward_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl CollectorConfig {
    fn validate(&self) -> Result<()> {
        if self.addr.port() == 0 {
            return Err(AggregatorError::config_invalid(
                "collector.addr",
                "port cannot be 0",
            ));
        }
        if self.forward_timeout_secs == 0 {
            return Err(AggregatorError::config_invalid(
                "collector.forward_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Forward timeout as a `Duration`.
    #[must_use]
    pub const fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            addr: default_collector_addr(),
            forward_timeout_secs: default_forward_timeout(),
            notify_on_shutdown: true,
        }
    }
}

// ============================================
// BatchingConfig
// ============================================

/// Batch scheduling section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Seconds between flush ticks.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_interval() -> u64 {
    5
}

impl BatchingConfig {
    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(AggregatorError::config_invalid(
                "batching.interval_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Flush interval as a `Duration`.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Resource limits section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrently served connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Per-frame read timeout in seconds; 0 disables.
    #[serde(default = "default_frame_read_timeout")]
    pub frame_read_timeout_secs: u64,

    /// Largest accepted frame.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_max_connections() -> usize {
    256
}

fn default_frame_read_timeout() -> u64 {
    30
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(AggregatorError::config_invalid(
                "limits.max_connections",
                "must be greater than 0",
            ));
        }
        if self.max_frame_bytes < 64 {
            return Err(AggregatorError::config_invalid(
                "limits.max_frame_bytes",
                "must be at least 64",
            ));
        }
        Ok(())
    }

    /// Read timeout, `None` when disabled.
    #[must_use]
    pub const fn frame_read_timeout(&self) -> Option<Duration> {
        if self.frame_read_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.frame_read_timeout_secs))
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            frame_read_timeout_secs: default_frame_read_timeout(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

// ============================================
// ShutdownConfig
// ============================================

/// Shutdown section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Upper bound on the final drain-and-forward.
    #[serde(default = "default_drain_deadline")]
    pub drain_deadline_secs: u64,

    /// Whether a node's `DLG` stops this aggregator.
    #[serde(default = "default_true")]
    pub honor_peer_requests: bool,
}

fn default_drain_deadline() -> u64 {
    10
}

impl ShutdownConfig {
    fn validate(&self) -> Result<()> {
        if self.drain_deadline_secs == 0 {
            return Err(AggregatorError::config_invalid(
                "shutdown.drain_deadline_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Drain deadline as a `Duration`.
    #[must_use]
    pub const fn drain_deadline(&self) -> Duration {
        Duration::from_secs(self.drain_deadline_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_deadline_secs: default_drain_deadline(),
            honor_peer_requests: true,
        }
    }
}

// ============================================
// RegistryConfig
// ============================================

/// Optional CSV registries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// `<aggregator_id>,<port>` rows; overrides the listen port.
    #[serde(default)]
    pub aggregators_csv: Option<PathBuf>,

    /// `<node_id>,<region>,<port>,<status>,<last_sync>` rows.
    #[serde(default)]
    pub nodes_csv: Option<PathBuf>,
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_requires_id() {
        let mut config = AggregatorConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AggregatorError::ConfigMissing { .. }));

        config.aggregator.id = "N_Agr".into();
        assert!(config.validate().is_ok());
        assert_eq!(config.aggregator_id().unwrap().region().as_str(), "N");
    }

    #[test]
    fn test_full_config_format() {
        let toml = r#"
            [aggregator]
            id = "S_Agr2"
            listen_addr = "0.0.0.0:11002"

            [collector]
            addr = "10.0.0.5:11000"
            forward_timeout_secs = 3
            notify_on_shutdown = false

            [batching]
            interval_secs = 2

            [limits]
            max_connections = 16
            frame_read_timeout_secs = 0
            max_frame_bytes = 4096

            [shutdown]
            drain_deadline_secs = 4
            honor_peer_requests = false

            [registry]
            aggregators_csv = "config_agr.csv"

            [logging]
            level = "debug"
        "#;

        let config = AggregatorConfig::from_str(toml).unwrap();
        assert_eq!(config.aggregator.listen_addr.port(), 11002);
        assert_eq!(config.collector.forward_timeout(), Duration::from_secs(3));
        assert!(!config.collector.notify_on_shutdown);
        assert_eq!(config.batching.interval(), Duration::from_secs(2));
        assert_eq!(config.limits.frame_read_timeout(), None);
        assert!(!config.shutdown.honor_peer_requests);
        assert_eq!(
            config.registry.aggregators_csv.as_deref(),
            Some(Path::new("config_agr.csv"))
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = AggregatorConfig::from_str("[aggregator]\nid = \"N_Agr\"\n").unwrap();
        assert_eq!(config.aggregator.listen_addr.port(), 11001);
        assert_eq!(config.collector.addr.port(), 11000);
        assert_eq!(config.collector.forward_timeout_secs, 10);
        assert_eq!(config.batching.interval_secs, 5);
        assert_eq!(config.limits.frame_read_timeout(), Some(Duration::from_secs(30)));
        assert!(config.shutdown.honor_peer_requests);
    }

    #[test]
    fn test_id_without_region_is_invalid() {
        let err = AggregatorConfig::from_str("[aggregator]\nid = \"Agregador\"\n").unwrap_err();
        assert!(matches!(err, AggregatorError::ConfigInvalid { .. }));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_zero_interval_is_invalid() {
        let toml = "[aggregator]\nid = \"N_Agr\"\n[batching]\ninterval_secs = 0\n";
        assert!(AggregatorConfig::from_str(toml).is_err());
    }

    #[tokio::test]
    async fn test_overrides_apply_before_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aggregator.toml");
        tokio::fs::write(&path, "[batching]\ninterval_secs = 3\n").await.unwrap();

        assert!(AggregatorConfig::load(&path).await.is_err());

        let overrides = ConfigOverrides {
            id: Some("N_Agr".into()),
            listen_addr: Some("127.0.0.1:12001".parse().unwrap()),
        };
        let config = AggregatorConfig::load_with(&path, &overrides).await.unwrap();
        assert_eq!(config.aggregator.id, "N_Agr");
        assert_eq!(config.aggregator.listen_addr.port(), 12001);
        assert_eq!(config.batching.interval_secs, 3);
    }
}
