// ============================================
// File: crates/tidelink-aggregator/src/forward/mod.rs
// ============================================
//! # Collector Forwarding
//!
//! ## Creation Reason
//! Moves formed batches, and the final shutdown notice, from the
//! aggregator to the central collector.
//!
//! ## Main Functionality
//! - `BatchForwarder`: the seam the scheduler and server call through
//! - `Ack`: what a successful forward reports back
//! - `ForwardError`: why a forward failed
//! - [`client`]: TCP implementation
//!
//! ## Architecture
//! ```text
//! ┌────────────────┐   send(&Batch)    ┌──────────────────┐
//! │ BatchScheduler │──────────────────►│  BatchForwarder  │
//! └────────────────┘                   │                  │
//! ┌────────────────┐ notify_shutdown() │ TcpForwardClient │──► collector
//! │   Aggregator   │──────────────────►│  (one conn, lazy)│
//! └────────────────┘      close()      └──────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A failed batch is dropped, never retried. Durable buffering would
//!   slot in behind this trait.
//! - Implementations must be safe to call from the scheduler and the
//!   shutdown path at the same time
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

pub mod client;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use tidelink_core::error::CoreError;
use tidelink_core::{Batch, ShutdownNotice};

pub use client::TcpForwardClient;

/// Result type for forward operations.
pub type Result<T> = std::result::Result<T, ForwardError>;

// ============================================
// Ack
// ============================================

/// Collector acknowledgement of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Entries in the acknowledged batch.
    pub readings: usize,
    /// Time from send to acknowledgement.
    pub elapsed: Duration,
}

// ============================================
// ForwardError
// ============================================

/// Forward failure.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Collector at {addr} unavailable: {reason}")]
    Unavailable {
        addr: String,
        reason: String,
    },

    #[error("No acknowledgement from collector within {}s", after.as_secs())]
    Timeout {
        after: Duration,
    },

    #[error("Collector answered '{reply}' instead of an acknowledgement")]
    Rejected {
        reply: String,
    },

    #[error("Failed to encode message: {0}")]
    Encode(#[from] CoreError),
}

impl ForwardError {
    pub fn unavailable(addr: impl ToString, reason: impl ToString) -> Self {
        Self::Unavailable {
            addr: addr.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` for connection-level failures.
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

// ============================================
// BatchForwarder
// ============================================

/// Delivers batches to the collector.
#[async_trait]
pub trait BatchForwarder: Send + Sync {
    /// Sends one batch and waits for its acknowledgement.
    ///
    /// # Errors
    /// Any `ForwardError`; the batch is not retried.
    async fn send(&self, batch: &Batch) -> Result<Ack>;

    /// Tells the collector this aggregator is stopping.
    ///
    /// # Errors
    /// Any `ForwardError`.
    async fn notify_shutdown(&self, notice: &ShutdownNotice) -> Result<()>;

    /// Releases the collector connection.
    async fn close(&self);
}

// ============================================
// Test Support
// ============================================

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// Forwarder that records what it is given.
    #[derive(Default)]
    pub struct RecordingForwarder {
        pub batches: Mutex<Vec<Batch>>,
        pub notices: Mutex<Vec<ShutdownNotice>>,
        pub closed: AtomicBool,
        pub fail: AtomicBool,
    }

    impl RecordingForwarder {
        pub fn failing() -> Self {
            let f = Self::default();
            f.fail.store(true, Ordering::SeqCst);
            f
        }

        pub fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().iter().map(Batch::len).collect()
        }
    }

    #[async_trait]
    impl BatchForwarder for RecordingForwarder {
        async fn send(&self, batch: &Batch) -> Result<Ack> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ForwardError::unavailable("collector", "connection refused"));
            }
            self.batches.lock().push(batch.clone());
            Ok(Ack {
                readings: batch.len(),
                elapsed: Duration::ZERO,
            })
        }

        async fn notify_shutdown(&self, notice: &ShutdownNotice) -> Result<()> {
            self.notices.lock().push(notice.clone());
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}
