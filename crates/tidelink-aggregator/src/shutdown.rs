// ============================================
// File: crates/tidelink-aggregator/src/shutdown.rs
// ============================================
//! # Shutdown Coordination
//!
//! ## Creation Reason
//! Shutdown can start from three places: the operator console, a process
//! signal, or an edge node sending `DLG`. Every long-lived loop needs to
//! observe it the same way.
//!
//! ## Main Functionality
//! - `ShutdownCoordinator`: cloneable flag + broadcast
//! - `ShutdownCause`: who asked
//! - `watch_console`: reads operator commands from stdin
//!
//! ## Shutdown Ordering (driven by `Aggregator::run`)
//! ```text
//! trigger ─► accept loop stops ─► scheduler final drain (bounded)
//!         ─► shutdown notice to collector ─► forward connection closed
//!         ─► remaining tasks joined with a timeout
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `trigger` is idempotent; only the first cause is kept and logged
//! - Loops must check `is_triggered()` at the top as well as select on
//!   `subscribe()`, since a receiver created after the send misses it
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use tidelink_common::NodeId;
use tidelink_core::protocol::tokens;

// ============================================
// ShutdownCause
// ============================================

/// Origin of a shutdown request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCause {
    /// Operator typed the shutdown command.
    Operator,
    /// Process received Ctrl+C / SIGINT.
    Signal,
    /// An edge node sent `DLG`.
    Peer {
        /// Node id, if the session had identified itself.
        node_id: Option<NodeId>,
        /// Peer address.
        addr: SocketAddr,
    },
    /// The aggregator stopped itself, e.g. its listener failed.
    Internal {
        /// What went wrong.
        reason: String,
    },
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operator => write!(f, "operator"),
            Self::Signal => write!(f, "signal"),
            Self::Peer {
                node_id: Some(id),
                addr,
            } => write!(f, "peer {id} ({addr})"),
            Self::Peer { node_id: None, addr } => write!(f, "peer {addr}"),
            Self::Internal { reason } => write!(f, "internal failure ({reason})"),
        }
    }
}

// ============================================
// ShutdownCoordinator
// ============================================

#[derive(Debug)]
struct Inner {
    triggered: AtomicBool,
    cause: Mutex<Option<ShutdownCause>>,
    tx: broadcast::Sender<()>,
}

/// Process-wide shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl ShutdownCoordinator {
    /// Creates an untriggered coordinator.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(4);
        Self {
            inner: Arc::new(Inner {
                triggered: AtomicBool::new(false),
                cause: Mutex::new(None),
                tx,
            }),
        }
    }

    /// Requests shutdown.
    ///
    /// Returns `true` if this call started the shutdown.
    pub fn trigger(&self, cause: ShutdownCause) -> bool {
        if self.inner.triggered.swap(true, Ordering::AcqRel) {
            debug!("Shutdown already in progress, ignoring request from {}", cause);
            return false;
        }
        info!("Shutdown requested by {}", cause);
        *self.inner.cause.lock() = Some(cause);
        // No receivers is fine: loops also poll the flag.
        let _ = self.inner.tx.send(());
        true
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Cause of the shutdown, if triggered.
    #[must_use]
    pub fn cause(&self) -> Option<ShutdownCause> {
        self.inner.cause.lock().clone()
    }

    /// Receiver notified when shutdown is triggered.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.inner.tx.subscribe()
    }

    /// Completes once shutdown has been triggered.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_triggered() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================
// Console Watch
// ============================================

/// Returns `true` if `line` is the operator shutdown command.
#[must_use]
pub fn is_console_shutdown(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(tokens::SHUTDOWN)
}

/// Reads operator commands until shutdown or end of input.
///
/// A `DLG` line (any case) triggers an operator shutdown.
pub async fn watch_console<R>(input: R, shutdown: ShutdownCoordinator)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut rx = shutdown.subscribe();

    loop {
        if shutdown.is_triggered() {
            break;
        }
        tokio::select! {
            _ = rx.recv() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) if is_console_shutdown(&line) => {
                    shutdown.trigger(ShutdownCause::Operator);
                    break;
                }
                Ok(Some(line)) => {
                    if !line.trim().is_empty() {
                        info!("Unknown console command '{}', type {} to stop", line.trim(), tokens::SHUTDOWN);
                    }
                }
                Ok(None) => {
                    debug!("Console input closed");
                    break;
                }
                Err(e) => {
                    warn!("Console read failed: {}", e);
                    break;
                }
            }
        }
    }
}

// ============================================
// Tests
// ============================================
