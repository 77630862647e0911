// ============================================
// File: crates/tidelink-core/src/lib.rs
// ============================================
//! # Tidelink Core - Wire Protocol Library
//!
//! ## Creation Reason
//! Edge nodes, aggregators and the collector must agree byte-for-byte on
//! the handshake tokens, the data sentinel and the JSON shapes of readings
//! and batches. This crate is that agreement.
//!
//! ## Main Functionality
//!
//! ### Protocol Module ([`protocol`])
//! - Handshake and control tokens (`LIga`, `OK`, `ID:`, `ACK`, `DLG`, ...)
//! - `Frame`: classification of one received frame
//! - `Reading`, `Batch`, `ShutdownNotice`: JSON data model
//! - `JsonCodec`: sentinel-terminated JSON encoding
//! - `SessionFraming`: stream framing rule for transports
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │   tidelink-aggregator / collector / node            │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   tidelink-core  ◄──    tidelink-transport         │
//! │   You are here        │                            │
//! │         │             │                            │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             tidelink-common                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Tokens are case-sensitive and deployed nodes depend on them
//! - Reading decoding must keep accepting the legacy field names
//!   (`wavy_id`, `sensors`, `sensor_type`)
//! - Core performs no I/O; keep it that way so it stays testable
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod protocol;

// Re-export commonly used items
pub use error::{CoreError, Result};
pub use protocol::{
    Batch, BatchEntry, Codec, CollectorMessage, Frame, JsonCodec, Measurement, Reading,
    SessionFraming, ShutdownNotice,
};
