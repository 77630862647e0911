// ============================================
// File: crates/tidelink-node/src/lib.rs
// ============================================
//! # Tidelink Node Library
//!
//! ## Creation Reason
//! Reference edge node for the tidelink pipeline. Used by the simulator
//! binary and by end-to-end tests.
//!
//! ## Main Functionality
//! - [`client`]: handshake, reading submission, shutdown request
//! - [`backoff`]: retry delays for the handshake
//! - [`error`]: node error types
//!
//! ## Last Modified
//! v0.1.0 - Initial node library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backoff;
pub mod client;
pub mod error;

pub use backoff::BackoffPolicy;
pub use client::{EdgeClient, DEFAULT_REPLY_TIMEOUT};
pub use error::{NodeError, Result};
