// ============================================
// File: crates/tidelink-aggregator/src/server.rs
// ============================================
//! # Aggregator Orchestrator
//!
//! ## Creation Reason
//! Wires the accept loop, session tasks, batch scheduler and collector
//! forwarder together and owns the shutdown sequence.
//!
//! ## Main Functionality
//! - `Aggregator`: lifecycle of one regional aggregator
//! - Bounded accept loop (one task per connection, semaphore capped)
//! - Ordered shutdown: stop accepting, final drain, notify, close
//!
//! ## Aggregator Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Aggregator                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────┐   spawn    ┌──────────────────────────┐   │
//! │  │ Accept Loop  │───────────►│ Session Task (per conn)  │   │
//! │  │ (semaphore)  │            │   serve_connection()     │   │
//! │  └──────────────┘            └────────────┬─────────────┘   │
//! │                                           │ enqueue         │
//! │  ┌──────────────┐            ┌────────────▼─────────────┐   │
//! │  │ Signal Task  │            │      IngestionQueue      │   │
//! │  │ (Ctrl+C)     │            └────────────┬─────────────┘   │
//! │  └──────┬───────┘                         │ drain           │
//! │         │ trigger            ┌────────────▼─────────────┐   │
//! │         ▼                    │     BatchScheduler       │   │
//! │  ┌──────────────┐            └────────────┬─────────────┘   │
//! │  │  Shutdown    │                         │ send            │
//! │  │ Coordinator  │            ┌────────────▼─────────────┐   │
//! │  └──────────────┘            │     BatchForwarder       │───┼──► collector
//! │                              └──────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Session tasks are not cancelled on shutdown; each ends on EOF or
//!   its read timeout
//! - The shutdown notice goes out only after the final drain, so the
//!   collector never sees a batch after the notice
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use tidelink_common::Framing;
use tidelink_core::{SessionFraming, ShutdownNotice};
use tidelink_transport::{
    Acceptor, FrameOptions, TcpConnector, TcpFrameListener, TransportError,
};

use crate::config::AggregatorConfig;
use crate::context::{AggregatorContext, StatsSnapshot};
use crate::error::{AggregatorError, Result};
use crate::forward::{BatchForwarder, TcpForwardClient};
use crate::registry::apply_registry;
use crate::services::{serve_connection, BatchScheduler, NodeDirectory, NodeStatusSink};
use crate::shutdown::{ShutdownCause, ShutdownCoordinator};

/// Extra time given to background tasks beyond their own deadlines.
const JOIN_GRACE: Duration = Duration::from_secs(5);

/// Pause after a transient accept failure.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

// ============================================
// Aggregator
// ============================================

/// Regional aggregator.
///
/// # Lifecycle
/// 1. Create with `Aggregator::from_config(config)`
/// 2. Start with `aggregator.run().await`
/// 3. Stops on Ctrl+C, console `DLG`, or a peer `DLG`
pub struct Aggregator {
    config: AggregatorConfig,
    ctx: Arc<AggregatorContext>,
}

impl Aggregator {
    /// Creates an aggregator with an explicit node-status sink.
    ///
    /// # Errors
    /// Returns a configuration error if `config` is invalid.
    pub fn new(config: AggregatorConfig, nodes: Arc<dyn NodeStatusSink>) -> Result<Self> {
        config.validate()?;
        let id = config.aggregator_id()?;
        let ctx = AggregatorContext::new(
            id,
            nodes,
            ShutdownCoordinator::new(),
            config.shutdown.honor_peer_requests,
        );
        Ok(Self {
            config,
            ctx: Arc::new(ctx),
        })
    }

    /// Applies the CSV registries and creates an aggregator backed by a
    /// `NodeDirectory` seeded from them.
    ///
    /// # Errors
    /// Returns a configuration error if the registry or config is invalid.
    pub async fn from_config(mut config: AggregatorConfig) -> Result<Self> {
        let bindings = apply_registry(&mut config).await?;
        let nodes = Arc::new(NodeDirectory::from_bindings(bindings));
        Self::new(config, nodes)
    }

    /// Effective configuration (after registry overrides).
    #[must_use]
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Shared context.
    #[must_use]
    pub fn context(&self) -> Arc<AggregatorContext> {
        Arc::clone(&self.ctx)
    }

    /// Handle for triggering shutdown from outside.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.ctx.shutdown.clone()
    }

    /// Binds the configured TCP listener and runs until shutdown.
    ///
    /// # Errors
    /// Returns `StartupFailed` if the listener cannot be bound, or the
    /// fatal transport error that stopped the accept loop.
    pub async fn run(&self) -> Result<StatsSnapshot> {
        info!("Starting tidelink aggregator v{}", env!("CARGO_PKG_VERSION"));

        let limits = &self.config.limits;
        let framing: Arc<dyn Framing> = Arc::new(SessionFraming);
        let session_options = FrameOptions::default()
            .with_read_timeout(limits.frame_read_timeout())
            .with_max_frame_bytes(limits.max_frame_bytes);

        let listen_addr = self.config.aggregator.listen_addr;
        let listener = TcpFrameListener::bind_addr(listen_addr, Arc::clone(&framing), session_options)
            .await
            .map_err(|e| AggregatorError::startup_failed(format!("bind {listen_addr} failed: {e}")))?;

        let forward_timeout = self.config.collector.forward_timeout();
        let connector = TcpConnector::new(
            self.config.collector.addr,
            framing,
            FrameOptions::default(),
            forward_timeout,
        );
        let forwarder = Arc::new(TcpForwardClient::new(connector, forward_timeout));

        let signal_task = tokio::spawn(watch_signal(self.ctx.shutdown.clone()));
        let result = self.serve(listener, forwarder).await;
        signal_task.abort();
        result
    }

    /// Runs the aggregator on the given acceptor and forwarder.
    ///
    /// Returns once shutdown has completed.
    ///
    /// # Errors
    /// Returns the fatal transport error that stopped the accept loop.
    pub async fn serve<A, F>(&self, acceptor: A, forwarder: Arc<F>) -> Result<StatsSnapshot>
    where
        A: Acceptor,
        F: BatchForwarder + ?Sized + 'static,
    {
        let shutdown = self.ctx.shutdown.clone();
        let local = acceptor.local_addr()?;
        info!(
            "Aggregator {} (region {}) listening on {}, forwarding every {}s",
            self.ctx.id,
            self.ctx.region(),
            local,
            self.config.batching.interval_secs
        );

        let drain_deadline = self.config.shutdown.drain_deadline();
        let scheduler = BatchScheduler::new(
            Arc::clone(&self.ctx),
            Arc::clone(&forwarder),
            self.config.batching.interval(),
            drain_deadline,
        );
        let scheduler_task = tokio::spawn(scheduler.run());

        let accepted = self.accept_loop(&acceptor).await;

        // Ensure every loop sees the stop even if the listener ended it.
        match &accepted {
            Err(e) => {
                shutdown.trigger(ShutdownCause::Internal {
                    reason: e.to_string(),
                });
            }
            Ok(()) if !shutdown.is_triggered() => {
                shutdown.trigger(ShutdownCause::Internal {
                    reason: "listener closed".into(),
                });
            }
            Ok(()) => {}
        }
        info!("Shutting down aggregator {}...", self.ctx.id);

        match tokio::time::timeout(drain_deadline + JOIN_GRACE, scheduler_task).await {
            Ok(Ok(())) => debug!("Scheduler completed"),
            Ok(Err(e)) => warn!("Scheduler failed: {}", e),
            Err(_) => warn!("Scheduler timed out during shutdown"),
        }

        if self.config.collector.notify_on_shutdown {
            if let Err(e) = forwarder.notify_shutdown(&ShutdownNotice::now(self.ctx.id.clone())).await {
                warn!("Shutdown notice not delivered: {}", e);
            }
        }
        forwarder.close().await;

        let stats = self.ctx.stats.snapshot();
        info!(
            sessions = stats.sessions_established,
            rejected = stats.sessions_rejected,
            protocol_errors = stats.protocol_errors,
            readings = stats.readings_accepted,
            malformed = stats.malformed_payloads,
            batches = stats.batches_forwarded,
            dropped = stats.batches_dropped,
            online_nodes = self.ctx.nodes.online_count(),
            "Aggregator shutdown complete"
        );

        accepted.map(|()| stats)
    }

    /// Accepts connections until shutdown or a fatal listener error.
    async fn accept_loop<A: Acceptor>(&self, acceptor: &A) -> Result<()> {
        let shutdown = &self.ctx.shutdown;
        let permits = Arc::new(Semaphore::new(self.config.limits.max_connections));

        loop {
            if shutdown.is_triggered() {
                return Ok(());
            }

            if permits.available_permits() == 0 {
                debug!(
                    "Connection limit {} reached, waiting for a session to end",
                    self.config.limits.max_connections
                );
            }
            let permit = tokio::select! {
                () = shutdown.wait() => return Ok(()),
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return Ok(()),
                },
            };

            let accepted = tokio::select! {
                () = shutdown.wait() => return Ok(()),
                accepted = acceptor.accept() => accepted,
            };

            match accepted {
                Ok(conn) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        serve_connection(conn, ctx).await;
                        drop(permit);
                    });
                }
                Err(TransportError::ShuttingDown) => return Ok(()),
                Err(e) if e.is_fatal() => {
                    error!("Listener failed: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    error!("Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("id", &self.ctx.id)
            .field("listen_addr", &self.config.aggregator.listen_addr)
            .field("collector", &self.config.collector.addr)
            .finish()
    }
}

/// Triggers a signal shutdown on Ctrl+C.
async fn watch_signal(shutdown: ShutdownCoordinator) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                info!("Received shutdown signal");
                shutdown.trigger(ShutdownCause::Signal);
            }
            Err(e) => warn!("Cannot listen for Ctrl+C: {}", e),
        },
        () = shutdown.wait() => {}
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::testing::RecordingForwarder;
    use std::sync::atomic::Ordering;
    use tidelink_transport::{mock_network, Connector, FrameTransport, MockConnector};

    const READING: &str = r#"{"node_id":"N_Wavy01","measurements":[{"type":"temperature","value":18.2}],"timestamp":"2024-01-01T00:00:00Z"}<|EOM|>"#;

    fn config(max_connections: usize) -> AggregatorConfig {
        let mut config = AggregatorConfig::default();
        config.aggregator.id = "N_Agr".into();
        config.limits.max_connections = max_connections;
        config
    }

    fn aggregator(max_connections: usize) -> Aggregator {
        Aggregator::new(config(max_connections), Arc::new(NodeDirectory::new())).unwrap()
    }

    async fn exchange(connector: &MockConnector, frame: &[u8]) -> Vec<u8> {
        let mut conn = connector.connect().await.unwrap();
        conn.send_frame(frame).await.unwrap();
        conn.recv_frame().await.unwrap().unwrap().to_vec()
    }

    #[test]
    fn test_new_rejects_unregioned_id() {
        let mut config = config(4);
        config.aggregator.id = "Agregador".into();
        let err = Aggregator::new(config, Arc::new(NodeDirectory::new())).unwrap_err();
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_peer_shutdown_drains_and_notifies() {
        let agg = Arc::new(aggregator(8));
        let (connector, acceptor) = mock_network("127.0.0.1:11001".parse().unwrap());
        let forwarder = Arc::new(RecordingForwarder::default());

        let server = {
            let agg = Arc::clone(&agg);
            let forwarder = Arc::clone(&forwarder);
            tokio::spawn(async move { agg.serve(acceptor, forwarder).await })
        };

        let mut node = connector.connect().await.unwrap();
        node.send_frame(b"LIga").await.unwrap();
        assert_eq!(&node.recv_frame().await.unwrap().unwrap()[..], b"OK");
        node.send_frame(b"ID:N_Wavy01").await.unwrap();
        assert_eq!(&node.recv_frame().await.unwrap().unwrap()[..], b"ACK");
        node.close().await.unwrap();

        assert_eq!(exchange(&connector, READING.as_bytes()).await, b"<|OK|>");
        assert_eq!(exchange(&connector, b"DLG").await, b"<|OK|>");

        let stats = server.await.unwrap().unwrap();
        assert_eq!(stats.sessions_established, 1);
        assert_eq!(stats.readings_forwarded, 1);

        assert_eq!(forwarder.batch_sizes(), vec![1]);
        assert_eq!(forwarder.notices.lock().len(), 1);
        assert!(forwarder.closed.load(Ordering::SeqCst));
        assert!(matches!(
            agg.shutdown_handle().cause(),
            Some(ShutdownCause::Peer { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejected_node_sends_no_data() {
        let agg = Arc::new(aggregator(8));
        let (connector, acceptor) = mock_network("127.0.0.1:11001".parse().unwrap());
        let forwarder = Arc::new(RecordingForwarder::default());

        let server = {
            let agg = Arc::clone(&agg);
            let forwarder = Arc::clone(&forwarder);
            tokio::spawn(async move { agg.serve(acceptor, forwarder).await })
        };

        let mut node = connector.connect().await.unwrap();
        node.send_frame(b"LIga").await.unwrap();
        node.recv_frame().await.unwrap();
        node.send_frame(b"ID:S_Wavy02").await.unwrap();
        let reply = node.recv_frame().await.unwrap().unwrap();
        assert!(reply.starts_with(b"NACK:"));

        agg.shutdown_handle().trigger(ShutdownCause::Operator);
        let stats = server.await.unwrap().unwrap();

        assert_eq!(stats.sessions_rejected, 1);
        assert!(forwarder.batches.lock().is_empty());
        assert_eq!(agg.context().nodes.online_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_limit_defers_accept() {
        let agg = Arc::new(aggregator(1));
        let (connector, acceptor) = mock_network("127.0.0.1:11001".parse().unwrap());
        let forwarder = Arc::new(RecordingForwarder::default());

        let server = {
            let agg = Arc::clone(&agg);
            let forwarder = Arc::clone(&forwarder);
            tokio::spawn(async move { agg.serve(acceptor, forwarder).await })
        };

        let mut first = connector.connect().await.unwrap();
        first.send_frame(b"LIga").await.unwrap();
        assert_eq!(&first.recv_frame().await.unwrap().unwrap()[..], b"OK");

        let mut second = connector.connect().await.unwrap();
        second.send_frame(b"LIga").await.unwrap();
        let waited = tokio::time::timeout(Duration::from_millis(200), second.recv_frame()).await;
        assert!(waited.is_err(), "second session served while first held the only slot");

        first.send_frame(b"ID:N_Wavy01").await.unwrap();
        first.recv_frame().await.unwrap();
        first.close().await.unwrap();

        assert_eq!(&second.recv_frame().await.unwrap().unwrap()[..], b"OK");

        agg.shutdown_handle().trigger(ShutdownCause::Operator);
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_closed_listener_stops_aggregator() {
        let agg = aggregator(8);
        let (_connector, acceptor) = mock_network("127.0.0.1:11001".parse().unwrap());
        acceptor.close();

        let stats = agg
            .serve(acceptor, Arc::new(RecordingForwarder::default()))
            .await
            .unwrap();
        assert_eq!(stats.batches_forwarded, 0);
        assert!(matches!(
            agg.shutdown_handle().cause(),
            Some(ShutdownCause::Internal { .. })
        ));
    }
}
