// ============================================
// File: crates/tidelink-core/src/protocol/models.rs
// ============================================
//! # Data Model
//!
//! ## Creation Reason
//! JSON shapes of what flows through the pipeline: a node's `Reading`,
//! the aggregator's `Batch`, and the `ShutdownNotice` sent to the
//! collector when an aggregator goes down.
//!
//! ## Main Functionality
//! - `Reading` / `Measurement`: one edge-node sample
//! - `BatchEntry`: a parsed reading or an opaque unparseable payload
//! - `Batch`: readings drained in one scheduler tick
//! - `ShutdownNotice`, `CollectorMessage`: aggregator → collector frames
//!
//! ## ⚠️ Important Note for Next Developer
//! - Legacy nodes send `wavy_id`, `sensors` and `sensor_type`; the aliases
//!   below must stay. Encoding always uses the current names.
//! - `BatchEntry` is untagged: an entry that is a JSON string is opaque
//!
//! ## Last Modified
//! v0.1.0 - Initial model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tidelink_common::time::now_utc;
use tidelink_common::{AggregatorId, NodeId};

// ============================================
// Reading
// ============================================

/// One measured quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Sensor kind, e.g. `temperature`.
    #[serde(rename = "type", alias = "sensor_type")]
    pub kind: String,
    /// Measured value.
    pub value: f64,
}

impl Measurement {
    /// Creates a measurement.
    pub fn new(kind: impl Into<String>, value: f64) -> Self {
        Self {
            kind: kind.into(),
            value,
        }
    }
}

/// A sample emitted by an edge node. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Originating node.
    #[serde(alias = "wavy_id")]
    pub node_id: NodeId,
    /// Measurements in the order the node reported them.
    #[serde(alias = "sensors")]
    pub measurements: Vec<Measurement>,
    /// Capture time, normalised to UTC.
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Utc>,
}

impl Reading {
    /// Creates a reading captured now.
    #[must_use]
    pub fn now(node_id: NodeId, measurements: Vec<Measurement>) -> Self {
        Self {
            node_id,
            measurements,
            captured_at: now_utc(),
        }
    }
}

// ============================================
// Batch
// ============================================

/// One entry of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    /// A well-formed reading.
    Reading(Reading),
    /// A payload that did not parse; forwarded verbatim.
    Opaque(String),
}

impl BatchEntry {
    /// Returns the reading, if this entry is one.
    #[must_use]
    pub const fn as_reading(&self) -> Option<&Reading> {
        match self {
            Self::Reading(r) => Some(r),
            Self::Opaque(_) => None,
        }
    }

    /// Returns the originating node id, if known.
    #[must_use]
    pub fn node_id(&self) -> Option<&NodeId> {
        self.as_reading().map(|r| &r.node_id)
    }
}

impl From<Reading> for BatchEntry {
    fn from(reading: Reading) -> Self {
        Self::Reading(reading)
    }
}

/// Readings drained by one scheduler tick, stamped with the aggregator.
///
/// Forwarded as a single unit; entries are never split or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Aggregator that formed the batch.
    pub aggregator_id: AggregatorId,
    /// When the batch was formed.
    pub formed_at: DateTime<Utc>,
    /// Entries in queue-drain order.
    pub readings: Vec<BatchEntry>,
}

impl Batch {
    /// Forms a batch now.
    #[must_use]
    pub fn new(aggregator_id: AggregatorId, readings: Vec<BatchEntry>) -> Self {
        Self {
            aggregator_id,
            formed_at: now_utc(),
            readings,
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Returns `true` if the batch has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Number of opaque entries.
    #[must_use]
    pub fn opaque_count(&self) -> usize {
        self.readings
            .iter()
            .filter(|e| matches!(e, BatchEntry::Opaque(_)))
            .count()
    }
}

// ============================================
// Shutdown Notice
// ============================================

/// Notification that an aggregator is shutting down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownNotice {
    /// Aggregator going down.
    pub aggregator_id: AggregatorId,
    /// When shutdown began.
    pub timestamp: DateTime<Utc>,
}

impl ShutdownNotice {
    /// Creates a notice stamped now.
    #[must_use]
    pub fn now(aggregator_id: AggregatorId) -> Self {
        Self {
            aggregator_id,
            timestamp: now_utc(),
        }
    }
}

/// Any data frame an aggregator sends to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectorMessage {
    /// Batch of readings.
    Batch(Batch),
    /// Shutdown notification.
    Shutdown(ShutdownNotice),
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_current_field_names() {
        let json = r#"{"node_id":"N_Wavy01","measurements":[{"type":"temperature","value":18.2}],"timestamp":"2024-01-01T00:00:00Z"}"#;
        let reading: Reading = serde_json::from_str(json).unwrap();

        assert_eq!(reading.node_id.as_str(), "N_Wavy01");
        assert_eq!(reading.measurements, vec![Measurement::new("temperature", 18.2)]);
        assert_eq!(reading.captured_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_reading_legacy_field_names() {
        let json = r#"{"wavy_id":"N_Wavy01","sensors":[{"sensor_type":"humidity","value":55}],"timestamp":"2024-01-01T01:00:00.0000000+01:00"}"#;
        let reading: Reading = serde_json::from_str(json).unwrap();

        assert_eq!(reading.measurements[0].kind, "humidity");
        assert!((reading.measurements[0].value - 55.0).abs() < f64::EPSILON);
        assert_eq!(reading.captured_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_batch_entry_untagged() {
        let entries: Vec<BatchEntry> = serde_json::from_str(
            r#"[{"node_id":"N_W","measurements":[],"timestamp":"2024-01-01T00:00:00Z"},"garbage{"]"#,
        )
        .unwrap();

        assert!(entries[0].as_reading().is_some());
        assert_eq!(entries[1], BatchEntry::Opaque("garbage{".into()));
    }

    #[test]
    fn test_collector_message_discrimination() {
        let agr = AggregatorId::new("N_Agr").unwrap();

        let notice = serde_json::to_string(&ShutdownNotice::now(agr.clone())).unwrap();
        let msg: CollectorMessage = serde_json::from_str(&notice).unwrap();
        assert!(matches!(msg, CollectorMessage::Shutdown(_)));

        let batch = serde_json::to_string(&Batch::new(agr, vec![])).unwrap();
        let msg: CollectorMessage = serde_json::from_str(&batch).unwrap();
        assert!(matches!(msg, CollectorMessage::Batch(_)));
    }
}
