// ============================================
// File: crates/tidelink-aggregator/src/lib.rs
// ============================================
//! # Tidelink Aggregator Library
//!
//! ## Creation Reason
//! The regional tier of tidelink: admits edge nodes of one region,
//! queues their readings and forwards them to the central collector in
//! timed batches.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: TOML configuration
//! - [`registry`]: CSV registry adapters (ports, node bindings)
//! - [`context`]: shared state and statistics
//! - [`services`]: session protocol, ingestion queue, scheduler, nodes
//! - [`forward`]: collector forwarding
//! - [`shutdown`]: shutdown coordination and console watch
//! - [`server`]: orchestration
//! - [`error`]: aggregator error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Tidelink Aggregator                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Config    │────►│ Aggregator  │────►│ Session Tasks   │    │
//! │  │ + Registry  │     │ Orchestrator│     │ (per connection)│    │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘    │
//! │                             │                     │ enqueue     │
//! │                             ▼                     ▼             │
//! │                      ┌─────────────┐     ┌─────────────────┐    │
//! │                      │  Shutdown   │     │ IngestionQueue  │    │
//! │                      │ Coordinator │     └────────┬────────┘    │
//! │                      └─────────────┘              ▼             │
//! │                                          ┌─────────────────┐    │
//! │                                          │ BatchScheduler  │    │
//! │                                          └────────┬────────┘    │
//! ├───────────────────────────────────────────────────┼─────────────┤
//! │                     Transport Layer               ▼             │
//! │  ┌─────────────────────┐     ┌─────────────────────────────┐    │
//! │  │   TCP listener      │     │   TcpForwardClient          │    │
//! │  │  (edge nodes)       │     │   (central collector)       │    │
//! │  └─────────────────────┘     └─────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Node → LIga/OK → ID:<id>/ACK → <json><|EOM|>/<|OK|> → queue
//! queue → (every interval) → Batch → collector → <|ACK|>
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - One aggregator serves exactly one region (the prefix of its id)
//! - Queued readings are in memory only; a crash loses them
//! - Configuration changes require restart
//!
//! ## Last Modified
//! v0.1.0 - Initial aggregator library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod error;
pub mod forward;
pub mod registry;
pub mod server;
pub mod services;
pub mod shutdown;

// Re-export primary types
pub use config::AggregatorConfig;
pub use context::{AggregatorContext, AggregatorStats, StatsSnapshot};
pub use error::{AggregatorError, Result};
pub use forward::{Ack, BatchForwarder, ForwardError, TcpForwardClient};
pub use server::Aggregator;
pub use shutdown::{ShutdownCause, ShutdownCoordinator};
