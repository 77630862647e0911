// ============================================
// File: crates/tidelink-aggregator/src/registry.rs
// ============================================
//! # CSV Registry Adapters
//!
//! ## Creation Reason
//! Deployments describe which port each aggregator listens on, and which
//! nodes belong to which region, in small CSV files. These adapters read
//! them at startup; nothing writes them back.
//!
//! ## Main Functionality
//! - `find_aggregator_port`: `<aggregator_id>,<port>` lookup
//! - `parse_node_bindings`: `<node_id>,<region>,<port>,<status>,<last_sync>`
//! - `apply_registry`: folds both into an `AggregatorConfig` at startup
//!
//! ## ⚠️ Important Note for Next Developer
//! - Aggregator id lookup is case-insensitive, region checks are not
//! - Lines with too few columns and `#` comments are skipped
//!
//! ## Last Modified
//! v0.1.0 - Initial registry adapters

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use tidelink_common::time::parse_timestamp;
use tidelink_common::{AggregatorId, NodeId, Region};

use crate::config::AggregatorConfig;
use crate::error::{AggregatorError, Result};

// ============================================
// NodeBinding
// ============================================

/// One row of the node registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBinding {
    /// Node identifier.
    pub node_id: NodeId,
    /// Region the node is assigned to.
    pub region: Region,
    /// Port of the aggregator serving the node.
    pub port: u16,
    /// Whether the node was last known online.
    pub online: bool,
    /// Last successful sync, if ever.
    pub last_sync: Option<DateTime<Utc>>,
}

// ============================================
// Parsing
// ============================================

fn data_lines(content: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(i, line)| (i, line.split(',').map(str::trim).collect()))
}

/// Finds the listen port configured for `id`.
///
/// # Errors
/// Returns `ConfigMissing` when there is no row for `id`, and
/// `ConfigInvalid` when its port is not a positive integer.
pub fn find_aggregator_port(content: &str, id: &AggregatorId) -> Result<u16> {
    for (line, cols) in data_lines(content) {
        if cols.len() < 2 || !cols[0].eq_ignore_ascii_case(id.as_str()) {
            continue;
        }
        return match cols[1].parse::<u16>() {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(AggregatorError::config_invalid(
                format!("aggregators_csv line {line}"),
                format!("invalid port '{}' for {id}", cols[1]),
            )),
        };
    }
    Err(AggregatorError::config_missing(format!(
        "aggregators_csv entry for {id}"
    )))
}

/// Parses the node registry.
///
/// Malformed rows are skipped with a warning; one bad line does not stop
/// the aggregator from starting.
#[must_use]
pub fn parse_node_bindings(content: &str) -> Vec<NodeBinding> {
    let mut bindings = Vec::new();

    for (line, cols) in data_lines(content) {
        if cols.len() < 3 {
            warn!(line, "Skipping node registry row with {} columns", cols.len());
            continue;
        }

        let parsed = (|| -> std::result::Result<NodeBinding, String> {
            let node_id = NodeId::new(cols[0]).map_err(|e| e.to_string())?;
            let region = Region::new(cols[1]).map_err(|e| e.to_string())?;
            let port = cols[2]
                .parse::<u16>()
                .map_err(|_| format!("invalid port '{}'", cols[2]))?;
            let online = cols.get(3).is_some_and(|s| *s == "1");
            let last_sync = match cols.get(4) {
                Some(s) if !s.is_empty() => Some(parse_timestamp(s).map_err(|e| e.to_string())?),
                _ => None,
            };
            Ok(NodeBinding {
                node_id,
                region,
                port,
                online,
                last_sync,
            })
        })();

        match parsed {
            Ok(binding) => bindings.push(binding),
            Err(reason) => warn!(line, "Skipping node registry row: {}", reason),
        }
    }

    bindings
}

// ============================================
// Startup Integration
// ============================================

async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AggregatorError::config_load(path.display().to_string(), e.to_string()))
}

/// Applies the CSV registries to `config`.
///
/// Returns the node bindings of this aggregator's region; rows for other
/// regions are dropped with a warning.
///
/// # Errors
/// Any registry error here is fatal at startup.
pub async fn apply_registry(config: &mut AggregatorConfig) -> Result<Vec<NodeBinding>> {
    let id = config.aggregator_id()?;

    if let Some(path) = config.registry.aggregators_csv.clone() {
        let port = find_aggregator_port(&read(&path).await?, &id)?;
        info!(
            "Registry {} assigns port {} to {}",
            path.display(),
            port,
            id
        );
        config.aggregator.listen_addr.set_port(port);
    }

    let Some(path) = config.registry.nodes_csv.clone() else {
        return Ok(Vec::new());
    };

    let (own, foreign): (Vec<_>, Vec<_>) = parse_node_bindings(&read(&path).await?)
        .into_iter()
        .partition(|b| &b.region == id.region());

    for binding in &foreign {
        warn!(
            node_id = %binding.node_id,
            "Ignoring registry entry for region {} (this aggregator serves {})",
            binding.region,
            id.region()
        );
    }
    debug!("Loaded {} node bindings from {}", own.len(), path.display());

    Ok(own)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn agr(id: &str) -> AggregatorId {
        AggregatorId::new(id).unwrap()
    }

    #[test]
    fn test_find_aggregator_port() {
        let csv = "# id,port\nN_Agr,11001\nS_Agr, 11002\n";
        assert_eq!(find_aggregator_port(csv, &agr("N_Agr")).unwrap(), 11001);
        assert_eq!(find_aggregator_port(csv, &agr("s_agr")).unwrap(), 11002);
    }

    #[test]
    fn test_find_aggregator_port_errors() {
        let csv = "N_Agr,abc\nS_Agr,0\n";
        assert!(matches!(
            find_aggregator_port(csv, &agr("N_Agr")),
            Err(AggregatorError::ConfigInvalid { .. })
        ));
        assert!(find_aggregator_port(csv, &agr("S_Agr")).is_err());
        assert!(matches!(
            find_aggregator_port(csv, &agr("E_Agr")),
            Err(AggregatorError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn test_parse_node_bindings() {
        let csv = "N_Wavy01,N,11001,1,2024-01-01T00:00:00Z\nN_Wavy02,N,11001,0,\nbroken\nN_Wavy03,N,port,0\n";
        let bindings = parse_node_bindings(csv);

        assert_eq!(bindings.len(), 2);
        assert!(bindings[0].online);
        assert!(bindings[0].last_sync.is_some());
        assert!(!bindings[1].online);
        assert_eq!(bindings[1].last_sync, None);
    }

    #[tokio::test]
    async fn test_apply_registry() {
        let dir = tempfile::tempdir().unwrap();
        let agr_csv = dir.path().join("config_agr.csv");
        let nodes_csv = dir.path().join("config_nodes.csv");
        std::fs::write(&agr_csv, "N_Agr,12345\n").unwrap();
        std::fs::write(&nodes_csv, "N_Wavy01,N,12345,0\nS_Wavy02,S,12346,0\n").unwrap();

        let mut config = AggregatorConfig::default();
        config.aggregator.id = "N_Agr".into();
        config.registry.aggregators_csv = Some(agr_csv);
        config.registry.nodes_csv = Some(nodes_csv);

        let bindings = apply_registry(&mut config).await.unwrap();
        assert_eq!(config.aggregator.listen_addr.port(), 12345);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].node_id.as_str(), "N_Wavy01");
    }

    #[tokio::test]
    async fn test_apply_registry_missing_file() {
        let mut config = AggregatorConfig::default();
        config.aggregator.id = "N_Agr".into();
        config.registry.aggregators_csv = Some("/nonexistent/config_agr.csv".into());

        let err = apply_registry(&mut config).await.unwrap_err();
        assert!(err.is_config_error());
    }
}
