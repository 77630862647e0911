// ============================================
// File: crates/tidelink-aggregator/src/services/queue.rs
// ============================================
//! # Ingestion Queue
//!
//! ## Creation Reason
//! Many session tasks produce readings; one scheduler consumes them. The
//! queue is the only structure they share.
//!
//! ## Main Functionality
//! - `enqueue`: never blocks, never fails
//! - `drain_all`: atomically takes everything queued so far
//!
//! ## ⚠️ Important Note for Next Developer
//! - Unbounded on purpose; there is no back-pressure towards nodes
//! - The lock is held only to push or to swap the buffer out; never
//!   across an await
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use tidelink_core::BatchEntry;

/// FIFO multi-producer / single-consumer queue of batch entries.
#[derive(Debug, Default)]
pub struct IngestionQueue {
    entries: Mutex<VecDeque<BatchEntry>>,
    total_enqueued: AtomicU64,
}

impl IngestionQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn enqueue(&self, entry: BatchEntry) {
        self.entries.lock().push_back(entry);
        self.total_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes and returns everything currently queued, in insertion order.
    ///
    /// Entries enqueued after this call returns go to the next drain.
    #[must_use]
    pub fn drain_all(&self) -> Vec<BatchEntry> {
        let drained = std::mem::take(&mut *self.entries.lock());
        drained.into()
    }

    /// Number of entries waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Entries enqueued since startup.
    #[must_use]
    pub fn total_enqueued(&self) -> u64 {
        self.total_enqueued.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_drain_preserves_order_and_empties() {
        let queue = IngestionQueue::new();
        for i in 0..3 {
            queue.enqueue(BatchEntry::Opaque(format!("r{i}")));
        }

        let drained = queue.drain_all();
        assert_eq!(
            drained,
            vec![
                BatchEntry::Opaque("r0".into()),
                BatchEntry::Opaque("r1".into()),
                BatchEntry::Opaque("r2".into()),
            ]
        );
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());
        assert_eq!(queue.total_enqueued(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_drain_exactly_once() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 250;

        let queue = Arc::new(IngestionQueue::new());
        let mut handles = Vec::new();
        for p in 0..PRODUCERS {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                for i in 0..PER_PRODUCER {
                    queue.enqueue(BatchEntry::Opaque(format!("{p}-{i}")));
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let drained = queue.drain_all();
        assert_eq!(drained.len(), PRODUCERS * PER_PRODUCER);

        let unique: HashSet<String> = drained
            .into_iter()
            .map(|e| match e {
                BatchEntry::Opaque(s) => s,
                BatchEntry::Reading(_) => unreachable!(),
            })
            .collect();
        assert_eq!(unique.len(), PRODUCERS * PER_PRODUCER);
    }

    #[test]
    fn test_entries_after_drain_go_to_next_drain() {
        let queue = IngestionQueue::new();
        for i in 0..5 {
            queue.enqueue(BatchEntry::Opaque(i.to_string()));
        }

        let first = queue.drain_all();
        queue.enqueue(BatchEntry::Opaque("6".into()));

        assert_eq!(first.len(), 5);
        assert_eq!(queue.drain_all(), vec![BatchEntry::Opaque("6".into())]);
    }
}
