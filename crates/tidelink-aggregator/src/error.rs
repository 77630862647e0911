// ============================================
// File: crates/tidelink-aggregator/src/error.rs
// ============================================
//! # Aggregator Error Types
//!
//! ## Main Functionality
//! - `AggregatorError`: errors of startup, configuration and the server loop
//!
//! Per-session protocol errors are `CoreError`s and never escape the
//! session task; forwarding failures have their own `ForwardError`.
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use tidelink_common::error::CommonError;
use tidelink_core::error::CoreError;
use tidelink_transport::error::TransportError;

/// Result type for aggregator operations.
pub type Result<T> = std::result::Result<T, AggregatorError>;

/// Aggregator error types.
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        path: String,
        reason: String,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        field: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    ConfigMissing {
        field: String,
    },

    #[error("Aggregator failed to start: {reason}")]
    StartupFailed {
        reason: String,
    },

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AggregatorError {
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn config_missing(field: impl Into<String>) -> Self {
        Self::ConfigMissing {
            field: field.into(),
        }
    }

    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Errors the operator fixes by editing the config or registry files.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigInvalid { .. } | Self::ConfigMissing { .. }
        )
    }
}
