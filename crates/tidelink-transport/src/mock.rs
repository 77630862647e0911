// ============================================
// File: crates/tidelink-transport/src/mock.rs
// ============================================
//! # In-Memory Transport
//!
//! ## Creation Reason
//! Provides connections that deliver whole frames through in-memory
//! queues, so session and forwarding logic can be tested without sockets.
//!
//! ## Main Functionality
//! - `MockConnection::pair`: two connected endpoints
//! - `mock_network`: a `MockConnector` / `MockAcceptor` pair
//! - Connection refusal injection for failure tests
//!
//! ## Usage in Tests
//! ```
//! use tidelink_transport::mock::MockConnection;
//! use tidelink_transport::traits::FrameTransport;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut a, mut b) = MockConnection::pair();
//! a.send_frame(b"LIga").await?;
//! assert_eq!(&b.recv_frame().await?.unwrap()[..], b"LIga");
//! # Ok(())
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - Dropping a connection closes it, like a socket
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Result, TransportError};
use crate::traits::{Acceptor, Connector, FrameTransport};

/// Next synthetic client port.
static NEXT_PORT: AtomicU16 = AtomicU16::new(40_000);

fn synthetic_addr() -> SocketAddr {
    let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
}

// ============================================
// Pipe
// ============================================

/// Single-consumer queue with close notification.
struct Pipe<T> {
    queue: Mutex<VecDeque<T>>,
    notify: Notify,
    closed: AtomicBool,
}

impl<T> Pipe<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn push(&self, item: T) -> std::result::Result<(), T> {
        if self.closed.load(Ordering::Acquire) {
            return Err(item);
        }
        self.queue.lock().push_back(item);
        self.notify.notify_one();
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    async fn pop(&self) -> Option<T> {
        loop {
            if let Some(item) = self.queue.lock().pop_front() {
                return Some(item);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }
}

// ============================================
// MockConnection
// ============================================

/// One end of an in-memory frame connection.
pub struct MockConnection {
    inbound: Arc<Pipe<Bytes>>,
    outbound: Arc<Pipe<Bytes>>,
    peer: SocketAddr,
    closed: bool,
}

impl MockConnection {
    /// Creates two connected endpoints.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        Self::pair_with_addrs(synthetic_addr(), synthetic_addr())
    }

    /// Creates two connected endpoints with explicit addresses.
    ///
    /// `a_addr` is the address of the first endpoint, seen as the peer
    /// address by the second.
    #[must_use]
    pub fn pair_with_addrs(a_addr: SocketAddr, b_addr: SocketAddr) -> (Self, Self) {
        let a_to_b = Pipe::new();
        let b_to_a = Pipe::new();

        let a = Self {
            inbound: Arc::clone(&b_to_a),
            outbound: Arc::clone(&a_to_b),
            peer: b_addr,
            closed: false,
        };
        let b = Self {
            inbound: a_to_b,
            outbound: b_to_a,
            peer: a_addr,
            closed: false,
        };
        (a, b)
    }
}

#[async_trait]
impl FrameTransport for MockConnection {
    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.outbound
            .push(Bytes::copy_from_slice(frame))
            .map_err(|_| TransportError::Closed)
    }

    async fn recv_frame(&mut self) -> Result<Option<Bytes>> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        Ok(self.inbound.pop().await)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.outbound.close();
        Ok(())
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.outbound.close();
        self.inbound.close();
    }
}

impl std::fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnection")
            .field("peer", &self.peer)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

// ============================================
// Mock Network
// ============================================

/// Creates a connector that delivers connections to the returned acceptor.
#[must_use]
pub fn mock_network(listen_addr: SocketAddr) -> (MockConnector, MockAcceptor) {
    let pending = Pipe::new();
    let refuse = Arc::new(AtomicBool::new(false));
    (
        MockConnector {
            pending: Arc::clone(&pending),
            listen_addr,
            refuse: Arc::clone(&refuse),
        },
        MockAcceptor {
            pending,
            listen_addr,
        },
    )
}

/// In-memory dialer.
#[derive(Clone)]
pub struct MockConnector {
    pending: Arc<Pipe<MockConnection>>,
    listen_addr: SocketAddr,
    refuse: Arc<AtomicBool>,
}

impl MockConnector {
    /// Makes subsequent `connect` calls fail (or succeed again).
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::Release);
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Conn = MockConnection;

    async fn connect(&self) -> Result<MockConnection> {
        if self.refuse.load(Ordering::Acquire) {
            return Err(TransportError::connect_failed(
                self.listen_addr,
                "connection refused",
            ));
        }
        let (client, server) = MockConnection::pair_with_addrs(synthetic_addr(), self.listen_addr);
        self.pending.push(server).map_err(|_| {
            TransportError::connect_failed(self.listen_addr, "listener closed")
        })?;
        Ok(client)
    }

    fn remote_addr(&self) -> SocketAddr {
        self.listen_addr
    }
}

/// In-memory listener.
pub struct MockAcceptor {
    pending: Arc<Pipe<MockConnection>>,
    listen_addr: SocketAddr,
}

impl MockAcceptor {
    /// Stops accepting; pending and future `accept` calls fail.
    pub fn close(&self) {
        self.pending.close();
    }
}

#[async_trait]
impl Acceptor for MockAcceptor {
    type Conn = MockConnection;

    async fn accept(&self) -> Result<MockConnection> {
        self.pending.pop().await.ok_or(TransportError::ShuttingDown)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listen_addr)
    }
}

impl Drop for MockAcceptor {
    fn drop(&mut self) {
        self.pending.close();
    }
}

// ============================================
// Tests
// ============================================
