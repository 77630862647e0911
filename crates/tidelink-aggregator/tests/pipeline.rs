// ============================================
// File: crates/tidelink-aggregator/tests/pipeline.rs
// ============================================
//! End-to-end: edge node -> aggregator -> collector over loopback TCP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};

use tidelink_aggregator::services::NodeDirectory;
use tidelink_aggregator::{Aggregator, AggregatorConfig, ShutdownCause, TcpForwardClient};
use tidelink_collector::{Collector, MemoryStore};
use tidelink_common::{Framing, NodeId};
use tidelink_core::{Measurement, Reading, SessionFraming};
use tidelink_node::{BackoffPolicy, EdgeClient, NodeError};
use tidelink_transport::{Acceptor, FrameOptions, TcpConnector, TcpFrameListener};

const TIMEOUT: Duration = Duration::from_secs(5);

fn framing() -> Arc<dyn Framing> {
    Arc::new(SessionFraming)
}

async fn listener() -> TcpFrameListener {
    TcpFrameListener::bind_addr("127.0.0.1:0".parse().unwrap(), framing(), FrameOptions::default())
        .await
        .unwrap()
}

fn connector(addr: SocketAddr) -> TcpConnector {
    TcpConnector::new(addr, framing(), FrameOptions::default(), TIMEOUT)
}

struct Running {
    aggregator_addr: SocketAddr,
    aggregator: tokio::task::JoinHandle<tidelink_aggregator::Result<tidelink_aggregator::StatsSnapshot>>,
    shutdown: tidelink_aggregator::ShutdownCoordinator,
    store: Arc<MemoryStore>,
    collector: Collector,
    stop_collector: oneshot::Sender<()>,
}

async fn start_pipeline(region: &str) -> Running {
    let store = Arc::new(MemoryStore::new());
    let collector = Collector::new(store.clone());
    let collector_listener = listener().await;
    let collector_addr = collector_listener.local_addr().unwrap();
    let (stop_collector, stopped) = oneshot::channel::<()>();
    {
        let collector = collector.clone();
        tokio::spawn(async move {
            collector
                .serve(collector_listener, async {
                    let _ = stopped.await;
                })
                .await
        });
    }

    let config = AggregatorConfig::from_str(&format!(
        r#"
        [aggregator]
        id = "{region}_Agg01"
        listen_addr = "127.0.0.1:0"

        [collector]
        addr = "{collector_addr}"
        forward_timeout_secs = 2

        [batching]
        interval_secs = 1

        [shutdown]
        drain_deadline_secs = 2
        "#
    ))
    .unwrap();

    let aggregator = Aggregator::new(config, Arc::new(NodeDirectory::new())).unwrap();
    let shutdown = aggregator.shutdown_handle();
    let aggregator_listener = listener().await;
    let aggregator_addr = aggregator_listener.local_addr().unwrap();
    let forwarder = Arc::new(TcpForwardClient::new(
        connector(collector_addr),
        Duration::from_secs(2),
    ));
    let aggregator = tokio::spawn(async move {
        aggregator.serve(aggregator_listener, forwarder).await
    });

    Running {
        aggregator_addr,
        aggregator,
        shutdown,
        store,
        collector,
        stop_collector,
    }
}

fn reading(node: &NodeId, temperature: f64) -> Reading {
    Reading::now(node.clone(), vec![Measurement::new("temperature", temperature)])
}

#[tokio::test]
async fn test_readings_reach_collector_and_dlg_drains() {
    let running = start_pipeline("N").await;
    let node_id = NodeId::new("N_Wavy01").unwrap();
    let node = EdgeClient::new(node_id.clone(), connector(running.aggregator_addr));

    let (_cancel_tx, mut cancel) = watch::channel(false);
    node.handshake(&BackoffPolicy::default(), &mut cancel)
        .await
        .unwrap();

    for t in [18.2, 19.0, 20.5] {
        node.send_reading(&reading(&node_id, t)).await.unwrap();
    }
    node.request_shutdown().await.unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(10), running.aggregator)
        .await
        .expect("aggregator did not stop")
        .unwrap()
        .unwrap();

    assert!(matches!(
        running.shutdown.cause(),
        Some(ShutdownCause::Peer { .. })
    ));
    assert_eq!(stats.sessions_established, 1);
    assert_eq!(stats.readings_accepted, 3);
    assert_eq!(stats.readings_forwarded, 3);
    assert_eq!(stats.readings_dropped, 0);

    let stored = running.store.for_node(&node_id);
    let values: Vec<f64> = stored.iter().map(|r| r.measurements[0].value).collect();
    assert_eq!(values, vec![18.2, 19.0, 20.5]);

    let (batches, readings) = running.collector.stats().totals();
    assert!(batches >= 1);
    assert_eq!(readings, 3);

    let _ = running.stop_collector.send(());
}

#[tokio::test]
async fn test_foreign_region_node_is_rejected() {
    let running = start_pipeline("N").await;
    let node = EdgeClient::new(
        NodeId::new("S_Wavy02").unwrap(),
        connector(running.aggregator_addr),
    );

    let (_cancel_tx, mut cancel) = watch::channel(false);
    let err = node
        .handshake(&BackoffPolicy::default(), &mut cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Rejected { .. }));

    running.shutdown.trigger(ShutdownCause::Operator);
    let stats = tokio::time::timeout(Duration::from_secs(10), running.aggregator)
        .await
        .expect("aggregator did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(stats.sessions_rejected, 1);
    assert_eq!(stats.readings_accepted, 0);
    assert!(running.store.is_empty());

    let _ = running.stop_collector.send(());
}
