// ============================================
// File: crates/tidelink-aggregator/src/forward/client.rs
// ============================================
//! # TCP Forward Client
//!
//! ## Creation Reason
//! Delivers batches over one reusable connection to the collector.
//!
//! ## Main Functionality
//! - Lazy connect on first use, reconnect after any failure
//! - One request/acknowledgement exchange per call, bounded by a timeout
//! - Generic over `Connector`, so tests run it against the mock network
//!
//! ## ⚠️ Important Note for Next Developer
//! - The async mutex serialises exchanges; a second caller waits for the
//!   first acknowledgement instead of interleaving frames
//! - The timeout covers connect, write and acknowledgement together
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use tidelink_core::{Batch, Frame, JsonCodec, ShutdownNotice};
use tidelink_transport::{Connector, FrameTransport};

use super::{Ack, BatchForwarder, ForwardError, Result};

/// Forwarder holding one connection to the collector.
pub struct TcpForwardClient<C: Connector> {
    connector: C,
    conn: Mutex<Option<C::Conn>>,
    timeout: Duration,
    codec: JsonCodec,
}

impl<C: Connector> TcpForwardClient<C> {
    /// Creates a client. No connection is made until the first send.
    pub fn new(connector: C, timeout: Duration) -> Self {
        Self {
            connector,
            conn: Mutex::new(None),
            timeout,
            codec: JsonCodec::new(),
        }
    }

    /// Returns `true` while a collector connection is held.
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Sends `frame` and waits for `expected`, within the timeout.
    async fn exchange(&self, frame: &[u8], expected: &Frame) -> Result<()> {
        let mut slot = self.conn.lock().await;

        match tokio::time::timeout(self.timeout, self.exchange_on(&mut slot, frame, expected)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                *slot = None;
                Err(e)
            }
            Err(_) => {
                *slot = None;
                Err(ForwardError::Timeout {
                    after: self.timeout,
                })
            }
        }
    }

    async fn exchange_on(
        &self,
        slot: &mut Option<C::Conn>,
        frame: &[u8],
        expected: &Frame,
    ) -> Result<()> {
        let addr = self.connector.remote_addr();

        if slot.is_none() {
            let conn = self
                .connector
                .connect()
                .await
                .map_err(|e| ForwardError::unavailable(addr, e))?;
            debug!("Connected to collector at {}", addr);
            *slot = Some(conn);
        }
        let Some(conn) = slot.as_mut() else {
            return Err(ForwardError::unavailable(addr, "no connection"));
        };

        conn.send_frame(frame)
            .await
            .map_err(|e| ForwardError::unavailable(addr, e))?;

        let reply = conn
            .recv_frame()
            .await
            .map_err(|e| ForwardError::unavailable(addr, e))?
            .ok_or_else(|| ForwardError::unavailable(addr, "connection closed before acknowledgement"))?;

        match Frame::parse(&reply) {
            Ok(frame) if &frame == expected => Ok(()),
            Ok(frame) => Err(ForwardError::Rejected {
                reply: frame.to_string(),
            }),
            Err(_) => Err(ForwardError::Rejected {
                reply: String::from_utf8_lossy(&reply).into_owned(),
            }),
        }
    }
}

#[async_trait]
impl<C: Connector> BatchForwarder for TcpForwardClient<C> {
    async fn send(&self, batch: &Batch) -> Result<Ack> {
        let frame = self.codec.to_frame(batch)?;
        let started = Instant::now();

        self.exchange(&frame, &Frame::CollectorAck).await?;

        Ok(Ack {
            readings: batch.len(),
            elapsed: started.elapsed(),
        })
    }

    async fn notify_shutdown(&self, notice: &ShutdownNotice) -> Result<()> {
        let frame = self.codec.to_frame(notice)?;
        self.exchange(&frame, &Frame::Accepted).await?;
        info!("Collector notified of shutdown");
        Ok(())
    }

    async fn close(&self) {
        if let Some(mut conn) = self.conn.lock().await.take() {
            let _ = conn.close().await;
            debug!("Collector connection closed");
        }
    }
}

impl<C: Connector> fmt::Debug for TcpForwardClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpForwardClient")
            .field("collector", &self.connector.remote_addr())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
