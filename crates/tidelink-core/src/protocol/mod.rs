// ============================================
// File: crates/tidelink-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the text protocol spoken between edge nodes, aggregators and
//! the central collector.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`messages`]: Tokens and the `Frame` classification
//! - [`models`]: Reading / Batch / ShutdownNotice JSON model
//! - [`codec`]: Sentinel-terminated JSON codec and stream framing
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake (one connection)               │
//! │  Node ──── LIga ─────────────────────────────────► Aggr     │
//! │  Node ◄─── OK ──────────────────────────────────── Aggr     │
//! │  Node ──── ID:N_Wavy01 ──────────────────────────► Aggr     │
//! │  Node ◄─── ACK  |  NACK:<reason> ────────────────── Aggr     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    Data (one connection per reading)        │
//! │  Node ──── {"node_id":..}<|EOM|> ────────────────► Aggr     │
//! │  Node ◄─── <|OK|> ──────────────────────────────── Aggr     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    Forward (persistent)                     │
//! │  Aggr ──── {"aggregator_id":..}<|EOM|> ──────────► Collector│
//! │  Aggr ◄─── <|ACK|> ─────────────────────────────── Collector│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `<|OK|>` acknowledges both a reading and a shutdown request
//! - Frames carry no length prefix; see [`codec::SessionFraming`]
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod messages;
pub mod models;

// Re-export primary types
pub use codec::{Codec, JsonCodec, SessionFraming, WireMessage};
pub use messages::{tokens, Frame};
pub use models::{Batch, BatchEntry, CollectorMessage, Measurement, Reading, ShutdownNotice};
