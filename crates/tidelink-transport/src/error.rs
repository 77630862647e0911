// ============================================
// File: crates/tidelink-transport/src/error.rs
// ============================================
//! # Frame Transport Errors
//!
//! ## Creation Reason
//! Failures of listeners, dialers and framed connections, classified so
//! that callers can tell a dead peer from a dead listener.
//!
//! ## Main Functionality
//! - `TransportError`: every failure a transport can report
//! - Classification helpers used by callers to decide retry vs. abort
//!
//! ## ⚠️ Important Note for Next Developer
//! - Connect/send/receive failures concern one peer and are retryable
//! - `Closed` is the peer going away, not a local failure
//! - Only bind and address errors stop a listener
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use tidelink_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Transport result alias.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Errors raised by listeners, connectors and framed connections.
///
/// # Categories
/// - **Setup**: bind / address errors, fatal for the listener
/// - **Connection**: connect, send, receive failures, scoped to one peer
/// - **Framing**: oversized frames
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Setup Errors
    // ========================================

    /// Failed to bind to address.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Requested listen address
        addr: SocketAddr,
        /// Why binding failed
        reason: String,
    },

    /// Another socket holds the listen address.
    #[error("Address {addr} already in use")]
    AddressInUse {
        /// Contested address
        addr: SocketAddr,
    },

    /// Invalid socket address.
    #[error("Invalid address: {addr}")]
    InvalidAddress {
        /// Text that failed to parse
        addr: String,
    },

    // ========================================
    // Connection Errors
    // ========================================

    /// Failed to connect to a remote endpoint.
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectFailed {
        /// Remote address
        addr: SocketAddr,
        /// Why connecting failed
        reason: String,
    },

    /// Writing a frame failed.
    #[error("Failed to send to {dest}: {reason}")]
    SendFailed {
        /// Destination address
        dest: SocketAddr,
        /// Why send failed
        reason: String,
    },

    /// Reading from the peer failed.
    #[error("Failed to receive from {from_addr}: {reason}")]
    ReceiveFailed {
        /// Peer address
        from_addr: SocketAddr,
        /// Why receive failed
        reason: String,
    },

    /// Connection is closed.
    #[error("Connection closed")]
    Closed,

    /// Operation timed out.
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// Operation that ran out of time
        operation: String,
    },

    /// Listener is shutting down.
    #[error("Listener is closed")]
    ShuttingDown,

    // ========================================
    // Framing Errors
    // ========================================

    /// Peer sent more bytes than a frame may hold.
    #[error("Frame too large: max {max} bytes, buffered {actual}")]
    FrameTooLarge {
        /// Configured maximum
        max: usize,
        /// Bytes buffered without a complete frame
        actual: usize,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Socket-level failure.
    #[error("I/O error: {context}")]
    Io {
        /// Step that failed, e.g. `setting TCP_NODELAY`
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Identity or framing error from `tidelink-common`.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// `BindFailed` for `addr`.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// `ConnectFailed` for `addr`.
    pub fn connect_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// `Timeout` for `operation`.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Wraps a socket error with the step that raised it.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if a fresh attempt against the same peer may work.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. }
            | Self::ConnectFailed { .. }
            | Self::SendFailed { .. }
            | Self::ReceiveFailed { .. }
            | Self::Closed => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }

    /// Returns `true` if a listener cannot continue after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BindFailed { .. } | Self::AddressInUse { .. } | Self::InvalidAddress { .. }
        )
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "socket operation".into(),
            source: err,
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
    fn test_error_display() {
        let err = TransportError::FrameTooLarge { max: 16, actual: 20 };
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn test_error_classification() {
        let addr: SocketAddr = "127.0.0.1:11000".parse().unwrap();

        assert!(TransportError::connect_failed(addr, "refused").is_retryable());
        assert!(TransportError::timeout("recv").is_retryable());
        assert!(!TransportError::FrameTooLarge { max: 1, actual: 2 }.is_retryable());

        assert!(TransportError::AddressInUse { addr }.is_fatal());
        assert!(!TransportError::Closed.is_fatal());
    }
}
