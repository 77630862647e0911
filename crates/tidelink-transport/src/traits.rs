// ============================================
// File: crates/tidelink-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Session and forwarding logic must not care whether frames travel over
//! TCP or an in-memory pipe. These traits are the single seam.
//!
//! ## Main Functionality
//! - `FrameTransport`: one established connection (send / await / close)
//! - `Acceptor`: produces inbound connections
//! - `Connector`: produces outbound connections
//! - `FrameOptions`: limits shared by every implementation
//!
//! ## Design Philosophy
//! - Traits enable mock implementations for testing
//! - Async-first design with `async_trait`
//! - A connection is owned by exactly one task, hence `&mut self`
//!
//! ## ⚠️ Important Note for Next Developer
//! - `recv_frame` returning `Ok(None)` is an orderly EOF, not an error
//! - Implementations must be Send for use in spawned tasks
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Default maximum frame size in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

// ============================================
// FrameOptions
// ============================================

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOptions {
    /// Largest frame accepted before failing with `FrameTooLarge`.
    pub max_frame_bytes: usize,
    /// Time allowed for a single frame to arrive. `None` waits forever.
    pub read_timeout: Option<Duration>,
}

impl FrameOptions {
    /// Sets the read timeout.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the maximum frame size.
    #[must_use]
    pub const fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            read_timeout: None,
        }
    }
}

// ============================================
// FrameTransport Trait
// ============================================

/// One bidirectional frame connection.
///
/// # Example
/// ```ignore
/// async fn echo<T: FrameTransport>(conn: &mut T) -> Result<()> {
///     while let Some(frame) = conn.recv_frame().await? {
///         conn.send_frame(&frame).await?;
///     }
///     conn.close().await
/// }
/// ```
#[async_trait]
pub trait FrameTransport: Send {
    /// Sends one complete frame.
    ///
    /// # Errors
    /// Returns error if the peer is gone or the write fails.
    async fn send_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// Waits for the next complete frame.
    ///
    /// # Returns
    /// `Ok(None)` once the peer has closed and no bytes remain.
    ///
    /// # Errors
    /// Returns error on read failure, timeout, or oversized frame.
    async fn recv_frame(&mut self) -> Result<Option<Bytes>>;

    /// Closes the connection. Idempotent.
    ///
    /// # Errors
    /// Returns error if the orderly shutdown fails.
    async fn close(&mut self) -> Result<()>;

    /// Address of the remote peer.
    fn peer_addr(&self) -> SocketAddr;
}

// ============================================
// Acceptor / Connector Traits
// ============================================

/// Source of inbound connections.
#[async_trait]
pub trait Acceptor: Send + Sync {
    /// Connection type produced.
    type Conn: FrameTransport + 'static;

    /// Waits for the next inbound connection.
    ///
    /// # Errors
    /// Returns error if accepting fails; callers decide whether to continue.
    async fn accept(&self) -> Result<Self::Conn>;

    /// Returns the local address being listened on.
    ///
    /// # Errors
    /// Returns error if the address cannot be determined.
    fn local_addr(&self) -> Result<SocketAddr>;
}

/// Factory for outbound connections to one endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connection type produced.
    type Conn: FrameTransport + 'static;

    /// Opens a new connection.
    ///
    /// # Errors
    /// Returns `ConnectFailed` or `Timeout` if the endpoint is unreachable.
    async fn connect(&self) -> Result<Self::Conn>;

    /// Address this connector dials.
    fn remote_addr(&self) -> SocketAddr;
}
