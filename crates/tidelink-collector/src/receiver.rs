// ============================================
// File: crates/tidelink-collector/src/receiver.rs
// ============================================
//! # Batch Receiver
//!
//! ## Creation Reason
//! Accepts aggregator connections and stores what they forward.
//!
//! ## Main Functionality
//! - `Collector::serve`: accept loop, one task per aggregator
//! - `Collector::handle_connection`: frame loop for one aggregator
//!
//! ## Connection Protocol
//! ```text
//! Aggregator                         Collector
//!     │  {batch}<|EOM|>                  │
//!     │─────────────────────────────────►│ append each reading
//!     │                        <|ACK|>   │
//!     │◄─────────────────────────────────│
//!     │  {shutdown notice}<|EOM|>        │
//!     │─────────────────────────────────►│ log
//!     │                        <|OK|>    │
//!     │◄─────────────────────────────────│
//!     │  EOF                             │
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A batch is acknowledged even if some readings failed to store; the
//!   failures are logged and counted
//! - Opaque entries cannot be keyed by node and are not stored
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use tidelink_core::{Batch, BatchEntry, Codec, CollectorMessage, Frame, JsonCodec};
use tidelink_transport::{Acceptor, FrameTransport, TransportError};

use crate::error::Result;
use crate::store::PersistenceStore;

// ============================================
// CollectorStats
// ============================================

/// Collector counters.
#[derive(Debug, Default)]
pub struct CollectorStats {
    pub batches: AtomicU64,
    pub readings_stored: AtomicU64,
    pub readings_failed: AtomicU64,
    pub opaque_skipped: AtomicU64,
    pub shutdown_notices: AtomicU64,
}

impl CollectorStats {
    /// Current `(batches, readings_stored)`.
    #[must_use]
    pub fn totals(&self) -> (u64, u64) {
        (
            self.batches.load(Ordering::Relaxed),
            self.readings_stored.load(Ordering::Relaxed),
        )
    }
}

// ============================================
// Collector
// ============================================

/// Central collector.
#[derive(Clone)]
pub struct Collector {
    store: Arc<dyn PersistenceStore>,
    stats: Arc<CollectorStats>,
    codec: JsonCodec,
}

impl Collector {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self {
            store,
            stats: Arc::new(CollectorStats::default()),
            codec: JsonCodec::new(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }

    /// Accepts aggregator connections until `shutdown` completes.
    ///
    /// # Errors
    /// Returns the listener error if accepting fails fatally.
    pub async fn serve<A, S>(&self, acceptor: A, shutdown: S) -> Result<()>
    where
        A: Acceptor,
        S: Future<Output = ()>,
    {
        info!("Collector listening on {}", acceptor.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                () = &mut shutdown => break,
                accepted = acceptor.accept() => accepted,
            };

            match accepted {
                Ok(conn) => {
                    let this = self.clone();
                    tokio::spawn(async move { this.handle_connection(conn).await });
                }
                Err(TransportError::ShuttingDown) => break,
                Err(e) if e.is_fatal() => {
                    error!("Listener failed: {}", e);
                    return Err(e.into());
                }
                Err(e) => warn!("Accept failed: {}", e),
            }
        }

        let (batches, readings) = self.stats.totals();
        info!(batches, readings, "Collector stopped");
        Ok(())
    }

    /// Serves one aggregator connection until EOF.
    pub async fn handle_connection<T: FrameTransport>(&self, mut conn: T) {
        let peer = conn.peer_addr();
        info!(%peer, "Aggregator connected");

        loop {
            let raw = match conn.recv_frame().await {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    warn!(%peer, "Receive failed: {}", e);
                    break;
                }
            };

            let reply = self.handle_frame(&raw).await;
            if let Err(e) = conn.send_frame(&reply.encode()).await {
                warn!(%peer, "Failed to send {}: {}", reply.kind(), e);
                break;
            }
        }

        let _ = conn.close().await;
        info!(%peer, "Aggregator connection closed");
    }

    async fn handle_frame(&self, raw: &[u8]) -> Frame {
        let decoded: tidelink_core::Result<CollectorMessage> = self.codec.decode(raw);
        match decoded {
            Ok(CollectorMessage::Batch(batch)) => {
                self.store_batch(&batch).await;
                Frame::CollectorAck
            }
            Ok(CollectorMessage::Shutdown(notice)) => {
                self.stats.shutdown_notices.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Aggregator {} shutting down (at {})",
                    notice.aggregator_id,
                    notice.timestamp
                );
                Frame::Accepted
            }
            Err(e) => {
                warn!("Unrecognised message: {}", e);
                Frame::Reject(e.rejection_reason())
            }
        }
    }

    async fn store_batch(&self, batch: &Batch) {
        info!(
            aggregator = %batch.aggregator_id,
            readings = batch.len(),
            "Batch received"
        );
        self.stats.batches.fetch_add(1, Ordering::Relaxed);

        for entry in &batch.readings {
            match entry {
                BatchEntry::Reading(reading) => match self.store.append(reading).await {
                    Ok(()) => {
                        self.stats.readings_stored.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        self.stats.readings_failed.fetch_add(1, Ordering::Relaxed);
                        error!(node_id = %reading.node_id, "Failed to store reading: {}", e);
                    }
                },
                BatchEntry::Opaque(payload) => {
                    self.stats.opaque_skipped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        aggregator = %batch.aggregator_id,
                        bytes = payload.len(),
                        "Unstorable opaque entry skipped"
                    );
                }
            }
        }
        debug!("Batch from {} processed", batch.aggregator_id);
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
