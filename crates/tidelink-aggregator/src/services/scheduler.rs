// ============================================
// File: crates/tidelink-aggregator/src/services/scheduler.rs
// ============================================
//! # Batch Scheduler
//!
//! ## Creation Reason
//! Turns the ingestion queue into collector batches on a fixed period.
//!
//! ## Main Functionality
//! - `BatchScheduler::run`: tick loop until shutdown, then one final drain
//! - `BatchScheduler::flush`: drain, stamp, forward one batch
//!
//! ## Tick Behaviour
//! ```text
//! tick ──► drain_all() ──► empty? ──yes──► nothing sent
//!                            │no
//!                            ▼
//!               Batch { aggregator_id, formed_at, readings }
//!                            │
//!                            ▼
//!                  forwarder.send(&batch) ──► ok: forwarded
//!                                         └─► err: dropped
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The forward is awaited inside the tick, so a slow collector delays
//!   the next tick (`MissedTickBehavior::Delay`) rather than stacking
//!   sends
//! - Readings queued after a drain wait for the next tick
//! - After shutdown exactly one more flush runs, bounded by the drain
//!   deadline
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use tidelink_core::Batch;

use crate::context::AggregatorContext;
use crate::forward::BatchForwarder;

/// Consecutive forward failures before logging at error level.
const FAILURE_ESCALATION: u32 = 3;

/// Result of one flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Queue was empty; nothing was sent.
    Empty,
    /// Batch of this many entries acknowledged.
    Forwarded(usize),
    /// Batch of this many entries lost.
    Dropped(usize),
}

/// Periodic drain-and-forward loop.
pub struct BatchScheduler<F: ?Sized> {
    ctx: Arc<AggregatorContext>,
    forwarder: Arc<F>,
    interval: Duration,
    drain_deadline: Duration,
    failures: u32,
}

impl<F: BatchForwarder + ?Sized> BatchScheduler<F> {
    pub fn new(
        ctx: Arc<AggregatorContext>,
        forwarder: Arc<F>,
        interval: Duration,
        drain_deadline: Duration,
    ) -> Self {
        Self {
            ctx,
            forwarder,
            interval,
            drain_deadline,
            failures: 0,
        }
    }

    /// Runs until shutdown, then performs the final drain.
    pub async fn run(mut self) {
        info!("Batch scheduler started ({}s)", self.interval.as_secs());

        // First tick one full period after start.
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = self.ctx.shutdown.clone();

        loop {
            if shutdown.is_triggered() {
                break;
            }
            tokio::select! {
                () = shutdown.wait() => break,
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }

        info!(
            failures = self.consecutive_failures(),
            "Batch scheduler stopping, draining {} queued entries",
            self.ctx.queue.len()
        );
        match tokio::time::timeout(self.drain_deadline, self.flush()).await {
            Ok(outcome) => debug!("Final drain: {:?}", outcome),
            Err(_) => warn!(
                "Final drain exceeded {}s deadline, in-flight batch abandoned",
                self.drain_deadline.as_secs()
            ),
        }
    }

    /// Forward failures since the last acknowledged batch.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Drains the queue and forwards it as one batch.
    pub async fn flush(&mut self) -> FlushOutcome {
        let entries = self.ctx.queue.drain_all();
        if entries.is_empty() {
            return FlushOutcome::Empty;
        }

        let batch = Batch::new(self.ctx.id.clone(), entries);
        let size = batch.len();
        if batch.opaque_count() > 0 {
            debug!("Batch carries {} opaque entries", batch.opaque_count());
        }

        match self.forwarder.send(&batch).await {
            Ok(ack) => {
                self.failures = 0;
                self.ctx.stats.record_forwarded(size);
                info!(
                    readings = size,
                    elapsed_ms = u64::try_from(ack.elapsed.as_millis()).unwrap_or(u64::MAX),
                    "Batch forwarded"
                );
                FlushOutcome::Forwarded(size)
            }
            Err(e) => {
                self.failures += 1;
                self.ctx.stats.record_dropped(size);
                if self.failures >= FAILURE_ESCALATION {
                    error!(readings = size, failures = self.failures, "Batch dropped: {}", e);
                } else {
                    warn!(readings = size, "Batch dropped: {}", e);
                }
                FlushOutcome::Dropped(size)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::testing::RecordingForwarder;
    use crate::services::nodes::NodeDirectory;
    use crate::shutdown::{ShutdownCause, ShutdownCoordinator};
    use tidelink_common::{AggregatorId, NodeId};
    use tidelink_core::{BatchEntry, Measurement, Reading};

    fn context() -> Arc<AggregatorContext> {
        Arc::new(AggregatorContext::new(
            AggregatorId::new("N_Agr").unwrap(),
            Arc::new(NodeDirectory::new()),
            ShutdownCoordinator::new(),
            true,
        ))
    }

    fn reading(i: usize) -> BatchEntry {
        BatchEntry::Reading(Reading::now(
            NodeId::new(format!("N_Wavy{i:02}")).unwrap(),
            vec![Measurement::new("temperature", 18.0 + i as f64)],
        ))
    }

    fn scheduler(
        ctx: &Arc<AggregatorContext>,
        forwarder: &Arc<RecordingForwarder>,
    ) -> BatchScheduler<RecordingForwarder> {
        BatchScheduler::new(
            ctx.clone(),
            forwarder.clone(),
            Duration::from_secs(5),
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_empty_queue_sends_nothing() {
        let ctx = context();
        let forwarder = Arc::new(RecordingForwarder::default());
        let mut s = scheduler(&ctx, &forwarder);

        assert_eq!(s.flush().await, FlushOutcome::Empty);
        assert!(forwarder.batches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_batch_stamped_with_aggregator_id() {
        let ctx = context();
        let forwarder = Arc::new(RecordingForwarder::default());
        let mut s = scheduler(&ctx, &forwarder);

        for i in 0..7 {
            ctx.queue.enqueue(reading(i));
        }
        ctx.queue.enqueue(BatchEntry::Opaque("{broken".into()));

        assert_eq!(s.flush().await, FlushOutcome::Forwarded(8));
        let batches = forwarder.batches.lock();
        assert_eq!(batches[0].aggregator_id.as_str(), "N_Agr");
        assert_eq!(batches[0].opaque_count(), 1);
        assert_eq!(batches[0].readings[0].node_id().unwrap().as_str(), "N_Wavy00");
        assert_eq!(ctx.stats.snapshot().readings_forwarded, 8);
    }

    #[tokio::test]
    async fn test_failed_forward_drops_batch() {
        let ctx = context();
        let forwarder = Arc::new(RecordingForwarder::failing());
        let mut s = scheduler(&ctx, &forwarder);

        ctx.queue.enqueue(reading(1));
        assert_eq!(s.flush().await, FlushOutcome::Dropped(1));
        assert!(ctx.queue.is_empty());

        let stats = ctx.stats.snapshot();
        assert_eq!(stats.batches_dropped, 1);
        assert_eq!(stats.readings_dropped, 1);
    }

    #[tokio::test]
    async fn test_success_resets_failure_escalation() {
        let ctx = context();
        let forwarder = Arc::new(RecordingForwarder::failing());
        let mut s = scheduler(&ctx, &forwarder);

        for i in 0..FAILURE_ESCALATION {
            ctx.queue.enqueue(reading(i as usize));
            assert_eq!(s.flush().await, FlushOutcome::Dropped(1));
        }
        assert_eq!(s.consecutive_failures(), FAILURE_ESCALATION);

        // Empty ticks neither fail nor succeed.
        assert_eq!(s.flush().await, FlushOutcome::Empty);
        assert_eq!(s.consecutive_failures(), FAILURE_ESCALATION);

        forwarder.fail.store(false, std::sync::atomic::Ordering::SeqCst);
        ctx.queue.enqueue(reading(9));
        assert_eq!(s.flush().await, FlushOutcome::Forwarded(1));
        assert_eq!(s.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_after_failed_forward_sends_fresh_snapshot() {
        let ctx = context();
        let forwarder = Arc::new(RecordingForwarder::failing());
        let task = tokio::spawn(scheduler(&ctx, &forwarder).run());

        ctx.queue.enqueue(reading(1));
        ctx.queue.enqueue(reading(2));
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert!(forwarder.batches.lock().is_empty());
        assert!(ctx.queue.is_empty());
        assert_eq!(ctx.stats.snapshot().readings_dropped, 2);

        forwarder.fail.store(false, std::sync::atomic::Ordering::SeqCst);
        ctx.queue.enqueue(reading(3));
        tokio::time::sleep(Duration::from_secs(5)).await;

        {
            let batches = forwarder.batches.lock();
            assert_eq!(batches.len(), 1);
            assert_eq!(batches[0].len(), 1);
            assert_eq!(batches[0].readings[0].node_id().unwrap().as_str(), "N_Wavy03");
        }
        let stats = ctx.stats.snapshot();
        assert_eq!(stats.batches_dropped, 1);
        assert_eq!(stats.batches_forwarded, 1);

        ctx.shutdown.trigger(ShutdownCause::Operator);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reading_waits_for_next_tick() {
        let ctx = context();
        let forwarder = Arc::new(RecordingForwarder::default());
        let task = tokio::spawn(scheduler(&ctx, &forwarder).run());

        for i in 0..5 {
            ctx.queue.enqueue(reading(i));
        }
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(forwarder.batch_sizes(), vec![5]);

        ctx.queue.enqueue(reading(5));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(forwarder.batch_sizes(), vec![5, 1]);

        // Idle ticks send nothing.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(forwarder.batch_sizes(), vec![5, 1]);

        ctx.shutdown.trigger(ShutdownCause::Operator);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_runs_final_drain() {
        let ctx = context();
        let forwarder = Arc::new(RecordingForwarder::default());
        let task = tokio::spawn(scheduler(&ctx, &forwarder).run());

        ctx.queue.enqueue(reading(1));
        ctx.queue.enqueue(reading(2));
        ctx.shutdown.trigger(ShutdownCause::Operator);
        task.await.unwrap();

        assert_eq!(forwarder.batch_sizes(), vec![2]);
    }
}
