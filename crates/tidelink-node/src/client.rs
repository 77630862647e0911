// ============================================
// File: crates/tidelink-node/src/client.rs
// ============================================
//! # Edge Client
//!
//! ## Creation Reason
//! The node side of the session protocol.
//!
//! ## Main Functionality
//! - `handshake`: `LIga`/`OK`, `ID:<id>`/`ACK`, retried with backoff
//! - `send_reading`: one connection per reading, expects `<|OK|>`
//! - `request_shutdown`: one-shot `DLG`, expects `<|OK|>`
//!
//! ## ⚠️ Important Note for Next Developer
//! - A `NACK:` during the handshake is final: the node is in the wrong
//!   region and retrying cannot help
//! - Every exchange opens and closes its own connection
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use tidelink_common::NodeId;
use tidelink_core::protocol::tokens;
use tidelink_core::{Frame, JsonCodec, Reading};
use tidelink_transport::{Connector, FrameTransport};

use crate::backoff::BackoffPolicy;
use crate::error::{NodeError, Result};

/// Default wait for any aggregator reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for one edge node.
#[derive(Debug)]
pub struct EdgeClient<C> {
    node_id: NodeId,
    connector: C,
    codec: JsonCodec,
    reply_timeout: Duration,
}

impl<C: Connector> EdgeClient<C> {
    /// Creates a client for `node_id` dialing through `connector`.
    pub fn new(node_id: NodeId, connector: C) -> Self {
        Self {
            node_id,
            connector,
            codec: JsonCodec::new(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Overrides the reply timeout.
    #[must_use]
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Identity presented in `ID:`.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Performs the handshake, retrying under `policy` until it succeeds,
    /// is rejected, runs out of attempts, or `cancel` turns `true`.
    ///
    /// # Errors
    /// `Rejected`, `Exhausted` or `Cancelled`.
    pub async fn handshake(
        &self,
        policy: &BackoffPolicy,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let mut attempt = 1;
        loop {
            if *cancel.borrow() {
                return Err(NodeError::Cancelled);
            }

            let err = match self.try_handshake().await {
                Ok(()) => {
                    info!(node_id = %self.node_id, "Session established with {}", self.connector.remote_addr());
                    return Ok(());
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if !policy.allows(attempt + 1) {
                return Err(NodeError::Exhausted {
                    attempts: attempt,
                    last: err.to_string(),
                });
            }

            let delay = policy.jittered_delay(attempt);
            warn!(
                node_id = %self.node_id,
                attempt,
                "Handshake failed ({}), retrying in {:?}",
                err,
                delay
            );
            if sleep_or_cancel(delay, cancel).await {
                return Err(NodeError::Cancelled);
            }
            attempt += 1;
        }
    }

    /// One handshake attempt.
    ///
    /// # Errors
    /// Transport failures, `Rejected`, or an unexpected reply.
    pub async fn try_handshake(&self) -> Result<()> {
        let mut conn = self.connector.connect().await?;
        let result = self.handshake_on(&mut conn).await;
        let _ = conn.close().await;
        result
    }

    async fn handshake_on(&self, conn: &mut C::Conn) -> Result<()> {
        conn.send_frame(tokens::CONNECT.as_bytes()).await?;
        match self.reply(conn).await? {
            Frame::Proceed => {}
            other => return Err(NodeError::unexpected(tokens::PROCEED, other)),
        }

        let identify = Frame::Identify(self.node_id.as_str().to_string());
        conn.send_frame(&identify.encode()).await?;
        match self.reply(conn).await? {
            Frame::Established => Ok(()),
            Frame::Reject(reason) => Err(NodeError::Rejected { reason }),
            other => Err(NodeError::unexpected(tokens::ESTABLISHED, other)),
        }
    }

    /// Submits one reading on its own connection.
    ///
    /// # Errors
    /// Transport failures or a reply other than `<|OK|>`.
    pub async fn send_reading(&self, reading: &Reading) -> Result<()> {
        let frame = self.codec.to_frame(reading)?;
        self.one_shot(&frame).await?;
        debug!(
            node_id = %self.node_id,
            measurements = reading.measurements.len(),
            "Reading accepted"
        );
        Ok(())
    }

    /// Asks the aggregator to shut down.
    ///
    /// # Errors
    /// Transport failures or a reply other than `<|OK|>`.
    pub async fn request_shutdown(&self) -> Result<()> {
        self.one_shot(tokens::SHUTDOWN.as_bytes()).await?;
        info!(node_id = %self.node_id, "Aggregator acknowledged shutdown request");
        Ok(())
    }

    async fn one_shot(&self, frame: &[u8]) -> Result<()> {
        let mut conn = self.connector.connect().await?;
        let result = self.one_shot_on(&mut conn, frame).await;
        let _ = conn.close().await;
        result
    }

    async fn one_shot_on(&self, conn: &mut C::Conn, frame: &[u8]) -> Result<()> {
        conn.send_frame(frame).await?;
        match self.reply(conn).await? {
            Frame::Accepted => Ok(()),
            Frame::Reject(reason) => Err(NodeError::Rejected { reason }),
            other => Err(NodeError::unexpected(tokens::ACCEPTED, other)),
        }
    }

    async fn reply(&self, conn: &mut C::Conn) -> Result<Frame> {
        let raw = tokio::time::timeout(self.reply_timeout, conn.recv_frame())
            .await
            .map_err(|_| tidelink_transport::TransportError::timeout("waiting for aggregator reply"))??
            .ok_or(NodeError::NoReply)?;
        Ok(Frame::parse(&raw)?)
    }
}

/// Sleeps for `delay`. Returns `true` if cancelled first.
async fn sleep_or_cancel(delay: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    let cancelled = async {
        if cancel.wait_for(|c| *c).await.is_err() {
            // Sender gone: nobody can cancel any more.
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        () = tokio::time::sleep(delay) => false,
        () = cancelled => true,
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use tidelink_core::Measurement;
    use tidelink_transport::{mock_network, Acceptor, MockAcceptor, MockConnector};

    fn client(connector: MockConnector) -> EdgeClient<MockConnector> {
        EdgeClient::new(NodeId::new("N_Wavy01").unwrap(), connector)
    }

    /// Aggregator stand-in answering `LIga` and `ID:` with the given reply.
    fn fake_aggregator(acceptor: MockAcceptor, id_reply: &'static [u8]) {
        tokio::spawn(async move {
            while let Ok(mut conn) = acceptor.accept().await {
                while let Ok(Some(frame)) = conn.recv_frame().await {
                    let reply: &[u8] = match &frame[..] {
                        b"LIga" => b"OK",
                        f if f.starts_with(b"ID:") => id_reply,
                        _ => b"<|OK|>",
                    };
                    if conn.send_frame(reply).await.is_err() {
                        break;
                    }
                }
            }
        });
    }

    fn fast_policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(10),
            multiplier: 2.0,
            max_delay: Duration::from_millis(100),
            max_attempts: Some(max_attempts),
        }
    }

    #[tokio::test]
    async fn test_handshake_success() {
        let (connector, acceptor) = mock_network("127.0.0.1:11001".parse().unwrap());
        fake_aggregator(acceptor, b"ACK");
        let (_tx, mut cancel) = watch::channel(false);

        client(connector).handshake(&fast_policy(3), &mut cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let (connector, acceptor) = mock_network("127.0.0.1:11001".parse().unwrap());
        fake_aggregator(acceptor, b"NACK:region mismatch");
        let (_tx, mut cancel) = watch::channel(false);

        let err = client(connector)
            .handshake(&fast_policy(5), &mut cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Rejected { ref reason } if reason == "region mismatch"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_aggregator_exhausts_attempts() {
        let (connector, _acceptor) = mock_network("127.0.0.1:11001".parse().unwrap());
        connector.set_refuse(true);
        let (_tx, mut cancel) = watch::channel(false);

        let err = client(connector)
            .handshake(&fast_policy(3), &mut cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Exhausted { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_once_aggregator_is_up() {
        let (connector, acceptor) = mock_network("127.0.0.1:11001".parse().unwrap());
        connector.set_refuse(true);
        fake_aggregator(acceptor, b"ACK");
        let (_tx, mut cancel) = watch::channel(false);

        let flip = connector.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(25)).await;
            flip.set_refuse(false);
        });

        client(connector).handshake(&fast_policy(10), &mut cancel).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_retrying() {
        let (connector, _acceptor) = mock_network("127.0.0.1:11001".parse().unwrap());
        connector.set_refuse(true);
        let (tx, mut cancel) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });

        let err = client(connector)
            .handshake(&BackoffPolicy::unbounded(), &mut cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Cancelled));
    }

    #[tokio::test]
    async fn test_send_reading_and_shutdown() {
        let (connector, acceptor) = mock_network("127.0.0.1:11001".parse().unwrap());
        fake_aggregator(acceptor, b"ACK");
        let client = client(connector);

        let reading = Reading::now(
            client.node_id().clone(),
            vec![Measurement::new("temperature", 18.2)],
        );
        client.send_reading(&reading).await.unwrap();
        client.request_shutdown().await.unwrap();
    }
}
