// ============================================
// File: crates/tidelink-collector/src/error.rs
// ============================================
//! # Collector Error Types
//!
//! ## Last Modified
//! v0.1.0 - Initial error types

use std::path::PathBuf;

use thiserror::Error;

use tidelink_core::error::CoreError;
use tidelink_transport::error::TransportError;

/// Result type for collector operations.
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Collector error types.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Failed to write {}: {reason}", path.display())]
    StoreWrite {
        path: PathBuf,
        reason: String,
    },

    #[error("Store directory {} unusable: {reason}", path.display())]
    StoreOpen {
        path: PathBuf,
        reason: String,
    },

    #[error("Collector failed to start: {reason}")]
    StartupFailed {
        reason: String,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl CollectorError {
    pub fn store_write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::StoreWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn store_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::StoreOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CollectorError::store_write("/data/readings_N_Wavy01.jsonl", "disk full");
        assert!(err.to_string().contains("readings_N_Wavy01.jsonl"));
        assert!(err.to_string().contains("disk full"));

        let err = CollectorError::store_open("/data", "permission denied");
        assert!(err.to_string().contains("/data"));
    }
}
