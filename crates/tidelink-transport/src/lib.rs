// ============================================
// File: crates/tidelink-transport/src/lib.rs
// ============================================
//! # Tidelink Transport - Frame I/O Layer
//!
//! ## Creation Reason
//! Provides one frame-oriented transport interface (`connect`, send a
//! frame, await a frame, close) implemented once per medium, so protocol
//! logic never touches sockets directly.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `FrameTransport`, `Acceptor`, `Connector`
//! - [`tcp`]: TCP implementation with pluggable framing
//! - [`mock`]: In-memory implementation for tests
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │   tidelink-aggregator / collector / node            │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   tidelink-core        tidelink-transport          │
//! │                        You are here ◄──            │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             tidelink-common                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Transport does not depend on the protocol crate; framing is injected
//!   through `tidelink_common::Framing`
//! - Always use traits for testability
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod mock;
pub mod tcp;
pub mod traits;

// Re-export primary types
pub use error::{Result, TransportError};
pub use mock::{mock_network, MockAcceptor, MockConnection, MockConnector};
pub use tcp::{TcpConnector, TcpFrameConnection, TcpFrameListener};
pub use traits::{Acceptor, Connector, FrameOptions, FrameTransport};
