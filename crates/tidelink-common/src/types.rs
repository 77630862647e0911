// ============================================
// File: crates/tidelink-common/src/types.rs
// ============================================
//! # Identity Types
//!
//! ## Creation Reason
//! Node and aggregator identifiers carry their region as a prefix
//! (`N_Wavy01`, `S_Agr`). Routing and admission both depend on pulling
//! that prefix out the same way everywhere.
//!
//! ## Main Functionality
//! - [`Region`]: Region prefix (text before the first separator)
//! - [`NodeId`]: Edge node identifier
//! - [`AggregatorId`]: Aggregator identifier, always region-qualified
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only the FIRST separator counts: `N_Wavy_01` belongs to region `N`
//! - An identifier without a separator has no region; for a node this
//!   means admission is impossible, for an aggregator it is a config error
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// Separator between the region prefix and the rest of an identifier.
pub const REGION_SEPARATOR: char = '_';

/// Extracts the region prefix from a raw identifier.
///
/// Returns `None` when there is no separator or the prefix is empty.
#[must_use]
pub fn region_prefix(id: &str) -> Option<&str> {
    match id.split_once(REGION_SEPARATOR) {
        Some((prefix, _)) if !prefix.is_empty() => Some(prefix),
        _ => None,
    }
}

// ============================================
// Region
// ============================================

/// Geographic region prefix.
///
/// Comparison is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    /// Creates a region from its prefix text.
    ///
    /// # Errors
    /// Returns an error if the prefix is empty or contains the separator.
    pub fn new(prefix: impl Into<String>) -> Result<Self, CommonError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(CommonError::invalid_input("region", "cannot be empty"));
        }
        if prefix.contains(REGION_SEPARATOR) {
            return Err(CommonError::invalid_input(
                "region",
                format!("'{prefix}' must not contain '{REGION_SEPARATOR}'"),
            ));
        }
        Ok(Self(prefix))
    }

    /// Returns the prefix text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Region {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

// ============================================
// NodeId
// ============================================

/// Identifier declared by an edge node during the handshake.
///
/// Any non-empty text is a syntactically valid node id; whether it has a
/// region is checked separately so that the aggregator can reject it with
/// a precise reason.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id.
    ///
    /// # Errors
    /// Returns an error if the id is empty or only whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, CommonError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CommonError::invalid_input("node_id", "cannot be empty"));
        }
        Ok(Self(id))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the region this node belongs to.
    ///
    /// # Errors
    /// Returns `MissingRegion` when the id has no region prefix.
    pub fn region(&self) -> Result<Region, CommonError> {
        region_prefix(&self.0)
            .map(|p| Region(p.to_string()))
            .ok_or_else(|| CommonError::missing_region(&self.0))
    }

    /// Returns `true` if this node belongs to `region`.
    #[must_use]
    pub fn is_in(&self, region: &Region) -> bool {
        region_prefix(&self.0) == Some(region.as_str())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

// ============================================
// AggregatorId
// ============================================

/// Identifier of a regional aggregator.
///
/// Unlike [`NodeId`], construction fails without a region prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AggregatorId {
    id: String,
    region: Region,
}

impl AggregatorId {
    /// Creates an aggregator id, deriving its region.
    ///
    /// # Errors
    /// Returns `MissingRegion` if the id has no region prefix.
    pub fn new(id: impl Into<String>) -> Result<Self, CommonError> {
        let id = id.into();
        let region = region_prefix(&id)
            .map(|p| Region(p.to_string()))
            .ok_or_else(|| CommonError::missing_region(&id))?;
        Ok(Self { id, region })
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Returns the region this aggregator serves.
    #[must_use]
    pub fn region(&self) -> &Region {
        &self.region
    }
}

impl fmt::Display for AggregatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl FromStr for AggregatorId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for AggregatorId {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AggregatorId> for String {
    fn from(value: AggregatorId) -> Self {
        value.id
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_prefix() {
        assert_eq!(region_prefix("N_Wavy01"), Some("N"));
        assert_eq!(region_prefix("N_Wavy_01"), Some("N"));
        assert_eq!(region_prefix("Wavy01"), None);
        assert_eq!(region_prefix("_Wavy01"), None);
    }

    #[test]
    fn test_node_region_membership() {
        let north = Region::new("N").unwrap();
        let n: NodeId = "N_Wavy01".parse().unwrap();
        let s: NodeId = "S_Wavy02".parse().unwrap();

        assert!(n.is_in(&north));
        assert!(!s.is_in(&north));
        assert_eq!(s.region().unwrap().as_str(), "S");
    }

    #[test]
    fn test_region_is_case_sensitive() {
        let north = Region::new("N").unwrap();
        let n: NodeId = "n_Wavy01".parse().unwrap();
        assert!(!n.is_in(&north));
    }

    #[test]
    fn test_node_without_region() {
        let id = NodeId::new("Wavy01").unwrap();
        assert!(matches!(id.region(), Err(CommonError::MissingRegion { .. })));
        assert!(NodeId::new("  ").is_err());
    }

    #[test]
    fn test_aggregator_id() {
        let agr: AggregatorId = "N_Agr".parse().unwrap();
        assert_eq!(agr.region().as_str(), "N");
        assert!(AggregatorId::new("Agregador").is_err());
    }

    #[test]
    fn test_aggregator_id_serde() {
        let agr = AggregatorId::new("S_Agr2").unwrap();
        let json = serde_json::to_string(&agr).unwrap();
        assert_eq!(json, "\"S_Agr2\"");

        let back: AggregatorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.region().as_str(), "S");
        assert!(serde_json::from_str::<AggregatorId>("\"noregion\"").is_err());
    }
}
