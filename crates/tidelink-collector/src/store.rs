// ============================================
// File: crates/tidelink-collector/src/store.rs
// ============================================
//! # Reading Stores
//!
//! ## Creation Reason
//! Durable sink for the readings the collector receives.
//!
//! ## Main Functionality
//! - `PersistenceStore`: append one reading, keyed by its node id
//! - `FileStore`: one JSON-lines file per node
//! - `MemoryStore`: in-process store for tests and dry runs
//!
//! ## File Layout
//! ```text
//! <data_dir>/
//! ├── readings_N_Wavy01.jsonl
//! ├── readings_N_Wavy02.jsonl
//! └── readings_S_Wavy01.jsonl
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Appends for one node are serialised by a per-node async lock;
//!   different nodes write concurrently
//! - Node ids are sanitised before they become file names
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use tidelink_common::NodeId;
use tidelink_core::Reading;

use crate::error::{CollectorError, Result};

// ============================================
// PersistenceStore Trait
// ============================================

/// Append-only reading storage.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Appends one reading to its node's record.
    ///
    /// # Errors
    /// Returns an error if the reading could not be stored.
    async fn append(&self, reading: &Reading) -> Result<()>;
}

// ============================================
// FileStore
// ============================================

/// JSON-lines file per node.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    locks: DashMap<NodeId, Arc<tokio::sync::Mutex<()>>>,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    /// Returns `StoreOpen` if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CollectorError::store_open(&dir, e))?;
        debug!("File store at {}", dir.display());
        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds `node`'s readings.
    #[must_use]
    pub fn path_for(&self, node: &NodeId) -> PathBuf {
        let safe: String = node
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("readings_{safe}.jsonl"))
    }

    fn lock_for(&self, node: &NodeId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks.entry(node.clone()).or_default().value())
    }
}

#[async_trait]
impl PersistenceStore for FileStore {
    async fn append(&self, reading: &Reading) -> Result<()> {
        let path = self.path_for(&reading.node_id);

        let mut line =
            serde_json::to_vec(reading).map_err(|e| CollectorError::store_write(&path, e))?;
        line.push(b'\n');

        let lock = self.lock_for(&reading.node_id);
        let _guard = lock.lock().await;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| CollectorError::store_write(&path, e))?;
        file.write_all(&line)
            .await
            .map_err(|e| CollectorError::store_write(&path, e))?;
        file.flush()
            .await
            .map_err(|e| CollectorError::store_write(&path, e))?;
        Ok(())
    }
}

// ============================================
// MemoryStore
// ============================================

/// Readings kept in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: Mutex<Vec<Reading>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything stored.
    #[must_use]
    pub fn readings(&self) -> Vec<Reading> {
        self.readings.lock().clone()
    }

    /// Readings of one node.
    #[must_use]
    pub fn for_node(&self, node: &NodeId) -> Vec<Reading> {
        self.readings
            .lock()
            .iter()
            .filter(|r| &r.node_id == node)
            .cloned()
            .collect()
    }

    /// Number of stored readings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.lock().is_empty()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn append(&self, reading: &Reading) -> Result<()> {
        self.readings.lock().push(reading.clone());
        Ok(())
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use tidelink_core::Measurement;

    fn reading(node: &str, value: f64) -> Reading {
        Reading::now(
            NodeId::new(node).unwrap(),
            vec![Measurement::new("temperature", value)],
        )
    }

    #[tokio::test]
    async fn test_file_store_appends_per_node() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("data")).await.unwrap();

        store.append(&reading("N_Wavy01", 18.0)).await.unwrap();
        store.append(&reading("N_Wavy01", 19.0)).await.unwrap();
        store.append(&reading("N_Wavy02", 20.0)).await.unwrap();

        let node = NodeId::new("N_Wavy01").unwrap();
        let content = tokio::fs::read_to_string(store.path_for(&node)).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Reading = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.node_id, node);
        assert_eq!(first.measurements[0].value, 18.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_keep_lines_whole() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.append(&reading("N_Wavy01", f64::from(i))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let node = NodeId::new("N_Wavy01").unwrap();
        let content = tokio::fs::read_to_string(store.path_for(&node)).await.unwrap();
        assert_eq!(content.lines().count(), 50);
        assert!(content
            .lines()
            .all(|line| serde_json::from_str::<Reading>(line).is_ok()));
    }

    #[tokio::test]
    async fn test_path_is_sanitised() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let path = store.path_for(&NodeId::new("N_../../etc").unwrap());
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("readings_N_"));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        store.append(&reading("N_Wavy01", 1.0)).await.unwrap();
        store.append(&reading("S_Wavy01", 2.0)).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.for_node(&NodeId::new("S_Wavy01").unwrap()).len(), 1);
    }
}
