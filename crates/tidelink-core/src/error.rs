// ============================================
// File: crates/tidelink-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types for frame classification and payload decoding.
//!
//! ## Main Functionality
//! - `CoreError`: Primary error enum for protocol operations
//!
//! ## Error Categories
//! 1. **Protocol Errors**: unexpected or malformed frames during a session
//! 2. **Admission Errors**: region mismatch at handshake
//! 3. **Payload Errors**: readings that fail to parse (never fatal)
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use tidelink_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for protocol operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Protocol Errors
    // ========================================

    /// A well-formed frame arrived in a state that does not accept it.
    #[error("Unexpected frame '{frame}' in state {state}")]
    UnexpectedFrame {
        /// Session state at the time
        state: String,
        /// Short description of the frame
        frame: String,
    },

    /// Frame bytes are not a recognisable frame.
    #[error("Malformed frame: {reason}")]
    MalformedFrame {
        /// What's wrong with the frame
        reason: String,
    },

    /// Declared node id belongs to another region.
    #[error("Region mismatch: expected '{expected}', node declared '{actual}'")]
    RegionMismatch {
        /// Region served by this aggregator
        expected: String,
        /// Region (or identifier) the node declared
        actual: String,
    },

    // ========================================
    // Payload Errors
    // ========================================

    /// Data payload is not a valid reading.
    #[error("Invalid reading: {reason}")]
    InvalidReading {
        /// Parser error details
        reason: String,
    },

    /// Failed to encode a message.
    #[error("Encoding failed: {reason}")]
    Encode {
        /// Serializer error details
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `UnexpectedFrame` error.
    pub fn unexpected(state: impl ToString, frame: impl Into<String>) -> Self {
        Self::UnexpectedFrame {
            state: state.to_string(),
            frame: frame.into(),
        }
    }

    /// Creates a `MalformedFrame` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Creates a `RegionMismatch` error.
    pub fn region_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::RegionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an `InvalidReading` error.
    pub fn invalid_reading(reason: impl Into<String>) -> Self {
        Self::InvalidReading {
            reason: reason.into(),
        }
    }

    // ========================================
    // Peer-facing Text
    // ========================================

    /// Returns the reason text sent to the peer in a rejection token.
    #[must_use]
    pub fn rejection_reason(&self) -> String {
        match self {
            Self::RegionMismatch { expected, .. } => {
                format!("region mismatch, this aggregator serves '{expected}'")
            }
            Self::Common(CommonError::MissingRegion { .. }) => "node id has no region prefix".into(),
            Self::UnexpectedFrame { frame, .. } => format!("unexpected {frame}"),
            other => other.to_string(),
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
        let err = CoreError::region_mismatch("N", "S_Wavy02");
        assert!(err.to_string().contains("S_Wavy02"));
        assert!(err.rejection_reason().contains("'N'"));
    }

    #[test]
    fn test_common_error_conversion() {
        let common = CommonError::missing_region("Wavy01");
        let core: CoreError = common.into();
        assert!(matches!(core, CoreError::Common(_)));
        assert_eq!(core.rejection_reason(), "node id has no region prefix");
    }
}
