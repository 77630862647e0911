// ============================================
// File: crates/tidelink-common/src/lib.rs
// ============================================
//! # Tidelink Common - Shared Foundations
//!
//! ## Creation Reason
//! Provides the identity types and small utilities every tidelink crate
//! agrees on, so that region validation and timestamps behave the same
//! on the edge node, the aggregator and the collector.
//!
//! ## Main Functionality
//! - [`types`]: `NodeId`, `Region` and region-prefix parsing
//! - [`time`]: UTC wall-clock helpers
//! - [`framing`]: the `Framing` contract used by stream transports
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │   tidelink-aggregator / collector / node            │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   tidelink-core        tidelink-transport          │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             tidelink-common  ◄── You are here     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//! - Region comparison is case-sensitive, matching the wire tokens
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod framing;
pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use framing::Framing;
pub use types::{region_prefix, AggregatorId, NodeId, Region, REGION_SEPARATOR};
