// ============================================
// File: crates/tidelink-aggregator/src/context.rs
// ============================================
//! # Aggregator Context
//!
//! ## Creation Reason
//! Everything session tasks, the scheduler and the shutdown path share
//! lives in one object built at startup and handed out as an `Arc`.
//! There is no process-global state.
//!
//! ## Main Functionality
//! - `AggregatorContext`: identity, queue, node directory, shutdown, stats
//! - `AggregatorStats`: atomic counters and their snapshot
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tidelink_common::{AggregatorId, Region};

use crate::services::nodes::NodeStatusSink;
use crate::services::queue::IngestionQueue;
use crate::shutdown::ShutdownCoordinator;

// ============================================
// AggregatorStats
// ============================================

/// Aggregator counters.
#[derive(Debug, Default)]
pub struct AggregatorStats {
    pub sessions_established: AtomicU64,
    pub sessions_rejected: AtomicU64,
    pub protocol_errors: AtomicU64,
    pub readings_accepted: AtomicU64,
    pub malformed_payloads: AtomicU64,
    pub batches_forwarded: AtomicU64,
    pub batches_dropped: AtomicU64,
    pub readings_forwarded: AtomicU64,
    pub readings_dropped: AtomicU64,
}

impl AggregatorStats {
    pub fn record_established(&self) {
        self.sessions_established.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reading(&self, malformed: bool) {
        self.readings_accepted.fetch_add(1, Ordering::Relaxed);
        if malformed {
            self.malformed_payloads.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_forwarded(&self, readings: usize) {
        self.batches_forwarded.fetch_add(1, Ordering::Relaxed);
        self.readings_forwarded
            .fetch_add(readings as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, readings: usize) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        self.readings_dropped
            .fetch_add(readings as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sessions_established: self.sessions_established.load(Ordering::Relaxed),
            sessions_rejected: self.sessions_rejected.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            readings_accepted: self.readings_accepted.load(Ordering::Relaxed),
            malformed_payloads: self.malformed_payloads.load(Ordering::Relaxed),
            batches_forwarded: self.batches_forwarded.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            readings_forwarded: self.readings_forwarded.load(Ordering::Relaxed),
            readings_dropped: self.readings_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `AggregatorStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sessions_established: u64,
    pub sessions_rejected: u64,
    pub protocol_errors: u64,
    pub readings_accepted: u64,
    pub malformed_payloads: u64,
    pub batches_forwarded: u64,
    pub batches_dropped: u64,
    pub readings_forwarded: u64,
    pub readings_dropped: u64,
}

// ============================================
// AggregatorContext
// ============================================

/// Shared state of one aggregator instance.
pub struct AggregatorContext {
    /// This aggregator's identity.
    pub id: AggregatorId,
    /// Readings awaiting the next flush.
    pub queue: IngestionQueue,
    /// Registry effects.
    pub nodes: Arc<dyn NodeStatusSink>,
    /// Shutdown signal.
    pub shutdown: ShutdownCoordinator,
    /// Counters.
    pub stats: AggregatorStats,
    /// Whether a node's `DLG` stops the aggregator.
    pub honor_peer_requests: bool,
}

impl AggregatorContext {
    /// Builds a context with an empty queue and fresh counters.
    pub fn new(
        id: AggregatorId,
        nodes: Arc<dyn NodeStatusSink>,
        shutdown: ShutdownCoordinator,
        honor_peer_requests: bool,
    ) -> Self {
        Self {
            id,
            queue: IngestionQueue::new(),
            nodes,
            shutdown,
            stats: AggregatorStats::default(),
            honor_peer_requests,
        }
    }

    /// Region served by this aggregator.
    #[must_use]
    pub fn region(&self) -> &Region {
        self.id.region()
    }
}

impl std::fmt::Debug for AggregatorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorContext")
            .field("id", &self.id)
            .field("queued", &self.queue.len())
            .field("shutdown", &self.shutdown.is_triggered())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot() {
        let stats = AggregatorStats::default();
        stats.record_reading(false);
        stats.record_reading(true);
        stats.record_forwarded(2);
        stats.record_dropped(3);

        let snap = stats.snapshot();
        assert_eq!(snap.readings_accepted, 2);
        assert_eq!(snap.malformed_payloads, 1);
        assert_eq!(snap.batches_forwarded, 1);
        assert_eq!(snap.readings_forwarded, 2);
        assert_eq!(snap.readings_dropped, 3);
    }
}
