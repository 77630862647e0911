// ============================================
// File: crates/tidelink-collector/src/lib.rs
// ============================================
//! # Tidelink Collector Library
//!
//! ## Creation Reason
//! Central tier of tidelink: receives batches from regional aggregators,
//! acknowledges them and appends their readings per node.
//!
//! ## Main Functionality
//! - [`receiver`]: accept loop and per-aggregator frame handling
//! - [`store`]: `PersistenceStore` with file and memory backends
//! - [`error`]: collector error types
//!
//! ## ⚠️ Important Note for Next Developer
//! - Storage is append-only; there is no query side here
//!
//! ## Last Modified
//! v0.1.0 - Initial collector library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod receiver;
pub mod store;

pub use error::{CollectorError, Result};
pub use receiver::{Collector, CollectorStats};
pub use store::{FileStore, MemoryStore, PersistenceStore};
