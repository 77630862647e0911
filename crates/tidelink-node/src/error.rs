// ============================================
// File: crates/tidelink-node/src/error.rs
// ============================================
//! # Edge Node Error Types
//!
//! ## Last Modified
//! v0.1.0 - Initial error types

use thiserror::Error;

use tidelink_common::error::CommonError;
use tidelink_core::error::CoreError;
use tidelink_transport::error::TransportError;

/// Result type for edge node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Edge node error types.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Aggregator rejected node: {reason}")]
    Rejected {
        reason: String,
    },

    #[error("Expected {expected}, aggregator sent {got}")]
    UnexpectedReply {
        expected: &'static str,
        got: String,
    },

    #[error("Aggregator closed the connection before replying")]
    NoReply,

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: String,
    },

    #[error("Cancelled")]
    Cancelled,

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl NodeError {
    pub fn unexpected(expected: &'static str, got: impl ToString) -> Self {
        Self::UnexpectedReply {
            expected,
            got: got.to_string(),
        }
    }

    /// Returns `true` if another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::UnexpectedReply { .. } | Self::NoReply => true,
            _ => false,
        }
    }
}
