// ============================================
// File: crates/tidelink-aggregator/src/services/mod.rs
// ============================================
//! # Aggregator Services
//!
//! ## Creation Reason
//! The ingestion pipeline, separated from transport and orchestration.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`session`]: per-connection handshake and frame classification
//! - [`queue`]: multi-producer ingestion queue
//! - [`scheduler`]: timed drain-and-forward
//! - [`nodes`]: per-node status directory
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────────┐  enqueue  ┌─────────────────────────┐ │
//! │  │ SessionProtocol  │──────────►│     IngestionQueue      │ │
//! │  │  (one per conn)  │           │  - FIFO, unbounded      │ │
//! │  └────────┬─────────┘           └────────────┬────────────┘ │
//! │           │ status                           │ drain_all    │
//! │  ┌────────▼─────────┐           ┌────────────▼────────────┐ │
//! │  │  NodeDirectory   │           │     BatchScheduler      │ │
//! │  │  - online/sync   │           │  - stamp + forward      │ │
//! │  └──────────────────┘           └─────────────────────────┘ │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The queue is the only structure sessions share with each other
//! - Node status updates are serialised per node id by the directory
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod nodes;
pub mod queue;
pub mod scheduler;
pub mod session;

// Re-export primary types
pub use nodes::{NodeDirectory, NodeStatus, NodeStatusSink};
pub use queue::IngestionQueue;
pub use scheduler::{BatchScheduler, FlushOutcome};
pub use session::{serve_connection, Session, SessionProtocol, SessionState};
