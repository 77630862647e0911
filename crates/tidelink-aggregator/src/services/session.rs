// ============================================
// File: crates/tidelink-aggregator/src/services/session.rs
// ============================================
//! # Session Protocol
//!
//! ## Creation Reason
//! Every inbound connection runs the same small state machine: admit or
//! reject the node by region, then classify each frame as data or a
//! shutdown request. Keeping it free of I/O lets it be tested frame by
//! frame; `serve_connection` drives it over any `FrameTransport`.
//!
//! ## Main Functionality
//! - `SessionState`: protocol states
//! - `Session`: per-connection record
//! - `SessionProtocol`: `on_frame` / `on_eof` → `Step`, `on_closed`
//! - `serve_connection`: applies steps to the transport and context
//!
//! ## Session Lifecycle
//! ```text
//!            LIga/OK            ID:<id>/ACK
//! ┌──────┐ ─────────► ┌──────────┐ ─────────► ┌─────────────┐
//! │ Init │            │ AwaitId  │            │ Established │
//! └──┬───┘            └────┬─────┘            └──────┬──────┘
//!    │ DATA (anonymous)    │ mismatch/garbage        │ DATA
//!    │ DLG                 │ → NACK                  ▼
//!    │                     │                  ┌─────────────┐
//!    │                     │                  │  Receiving  │
//!    │                     │                  └──────┬──────┘
//!    │                     │   DLG (any state)       │
//!    │                     │        ▼                │
//!    │                     │ ┌──────────────┐        │
//!    │                     │ │ ShuttingDown │        │
//!    │                     │ └──────┬───────┘        │
//!    ▼                     ▼        ▼ <|OK|> sent    ▼
//! ┌────────────────────────────────────────────────────────┐
//! │                         Closed                         │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A first frame carrying the sentinel is an anonymous one-shot data
//!   submission: no handshake, no region check, connection closes after
//!   `<|OK|>`. Deployed nodes rely on this.
//! - Unparseable data is never dropped; it travels on as opaque text
//! - Errors stay inside the session; nothing here can stop the process
//!   except an honoured `DLG`
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use tidelink_common::{NodeId, Region};
use tidelink_core::error::CoreError;
use tidelink_core::{BatchEntry, Frame, JsonCodec};
use tidelink_transport::{FrameTransport, TransportError};

use crate::context::AggregatorContext;
use crate::shutdown::ShutdownCause;

// ============================================
// Session State
// ============================================

/// Session state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    AwaitId,
    Established,
    Receiving,
    ShuttingDown,
    Closed,
}

impl SessionState {
    /// Returns `true` once the node has been admitted.
    #[must_use]
    pub const fn is_established(&self) -> bool {
        matches!(self, Self::Established | Self::Receiving)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::AwaitId => write!(f, "AWAIT_ID"),
            Self::Established => write!(f, "ESTABLISHED"),
            Self::Receiving => write!(f, "RECEIVING"),
            Self::ShuttingDown => write!(f, "SHUTTING_DOWN"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

// ============================================
// Session
// ============================================

/// Per-connection session record.
#[derive(Debug, Clone)]
pub struct Session {
    pub peer: SocketAddr,
    pub declared_node_id: Option<NodeId>,
    pub state: SessionState,
    pub region: Region,
}

// ============================================
// Step
// ============================================

/// Side effect requested by the state machine.
#[derive(Debug)]
pub enum SessionAction {
    None,
    /// Node admitted.
    Established(NodeId),
    /// Node refused; the reason was sent as `NACK:`.
    Rejected(CoreError),
    /// Frame did not fit the protocol.
    ProtocolViolation(CoreError),
    /// Queue this entry. `parse_error` is set when it is opaque.
    Enqueue {
        entry: BatchEntry,
        parse_error: Option<CoreError>,
    },
    /// Peer requested shutdown.
    Shutdown { node_id: Option<NodeId> },
}

/// Outcome of one frame.
#[derive(Debug)]
pub struct Step {
    /// Frame to send back, if any.
    pub reply: Option<Frame>,
    pub action: SessionAction,
    /// Close the connection after replying.
    pub close: bool,
}

impl Step {
    fn reply(frame: Frame, action: SessionAction) -> Self {
        Self {
            reply: Some(frame),
            action,
            close: false,
        }
    }

    fn reply_and_close(frame: Frame, action: SessionAction) -> Self {
        Self {
            reply: Some(frame),
            action,
            close: true,
        }
    }
}

// ============================================
// SessionProtocol
// ============================================

/// Sans-I/O session state machine.
#[derive(Debug)]
pub struct SessionProtocol {
    session: Session,
    codec: JsonCodec,
}

impl SessionProtocol {
    pub fn new(peer: SocketAddr, region: Region) -> Self {
        Self {
            session: Session {
                peer,
                declared_node_id: None,
                state: SessionState::Init,
                region,
            },
            codec: JsonCodec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Processes one received frame.
    pub fn on_frame(&mut self, raw: &[u8]) -> Step {
        let state = self.session.state;
        let frame = match Frame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => return self.violation(e),
        };
        trace!(peer = %self.session.peer, %state, "Frame {}", frame);

        match (state, frame) {
            (SessionState::Closed | SessionState::ShuttingDown, frame) => {
                self.violation(CoreError::unexpected(state, frame.kind()))
            }

            // Shutdown is a one-shot command valid in every open state.
            (_, Frame::Shutdown) => {
                self.session.state = SessionState::ShuttingDown;
                Step::reply_and_close(
                    Frame::Accepted,
                    SessionAction::Shutdown {
                        node_id: self.session.declared_node_id.clone(),
                    },
                )
            }

            (SessionState::Init, Frame::Connect) => {
                self.session.state = SessionState::AwaitId;
                Step::reply(Frame::Proceed, SessionAction::None)
            }

            (SessionState::Init, Frame::Data(payload)) => {
                self.session.state = SessionState::Closed;
                Step::reply_and_close(Frame::Accepted, self.classify(&payload))
            }

            (SessionState::AwaitId, Frame::Identify(raw_id)) => self.admit(&raw_id),

            (SessionState::Established | SessionState::Receiving, Frame::Data(payload)) => {
                self.session.state = SessionState::Receiving;
                Step::reply(Frame::Accepted, self.classify(&payload))
            }

            (state, frame) => self.violation(CoreError::unexpected(state, frame.kind())),
        }
    }

    /// Records an orderly EOF from the peer.
    ///
    /// Returns the violation when the peer left mid-handshake.
    pub fn on_eof(&mut self) -> Option<CoreError> {
        let state = std::mem::replace(&mut self.session.state, SessionState::Closed);
        (state == SessionState::AwaitId).then(|| CoreError::unexpected(state, "EOF"))
    }

    /// Marks the connection as gone. Called once the driver has closed it.
    pub fn on_closed(&mut self) {
        self.session.state = SessionState::Closed;
    }

    fn admit(&mut self, raw_id: &str) -> Step {
        let verdict = NodeId::new(raw_id).map_err(CoreError::from).and_then(|id| {
            let region = id.region()?;
            if region == self.session.region {
                Ok(id)
            } else {
                Err(CoreError::region_mismatch(
                    self.session.region.as_str(),
                    id.as_str(),
                ))
            }
        });

        match verdict {
            Ok(id) => {
                self.session.declared_node_id = Some(id.clone());
                self.session.state = SessionState::Established;
                Step::reply(Frame::Established, SessionAction::Established(id))
            }
            Err(e) => {
                self.session.state = SessionState::Closed;
                Step::reply_and_close(
                    Frame::Reject(e.rejection_reason()),
                    SessionAction::Rejected(e),
                )
            }
        }
    }

    fn classify(&self, payload: &str) -> SessionAction {
        match self.codec.decode_reading(payload) {
            Ok(reading) => SessionAction::Enqueue {
                entry: BatchEntry::Reading(reading),
                parse_error: None,
            },
            Err(e) => SessionAction::Enqueue {
                entry: BatchEntry::Opaque(payload.to_string()),
                parse_error: Some(e),
            },
        }
    }

    fn violation(&mut self, err: CoreError) -> Step {
        self.session.state = SessionState::Closed;
        Step::reply_and_close(
            Frame::Reject(err.rejection_reason()),
            SessionAction::ProtocolViolation(err),
        )
    }
}

/// Best-effort node id from a payload that failed to parse as a reading.
#[must_use]
pub fn sniff_node_id(payload: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    ["node_id", "wavy_id"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()).map(str::to_string))
}

// ============================================
// Connection Driver
// ============================================

/// Runs one connection to completion.
///
/// Never returns an error: every failure is scoped to this connection
/// and logged here.
pub async fn serve_connection<T: FrameTransport>(mut conn: T, ctx: Arc<AggregatorContext>) {
    let peer = conn.peer_addr();
    let mut protocol = SessionProtocol::new(peer, ctx.region().clone());
    debug!(%peer, "Session opened");

    loop {
        let raw = match conn.recv_frame().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                if let Some(e) = protocol.on_eof() {
                    ctx.stats.record_protocol_error();
                    debug!(%peer, "Session aborted: {}", e);
                }
                break;
            }
            Err(TransportError::Timeout { .. }) => {
                debug!(%peer, state = %protocol.state(), "Session timed out waiting for a frame");
                break;
            }
            Err(e) => {
                warn!(%peer, state = %protocol.state(), "Session receive failed: {}", e);
                break;
            }
        };

        let step = protocol.on_frame(&raw);

        // Queue before acknowledging so that `<|OK|>` means "accepted".
        let shutdown_request = apply_action(&ctx, &protocol, peer, step.action);

        if let Some(reply) = step.reply {
            if let Err(e) = conn.send_frame(&reply.encode()).await {
                debug!(%peer, "Failed to send {}: {}", reply.kind(), e);
                break;
            }
        }

        if step.close {
            let _ = conn.close().await;
            if let Some(node_id) = shutdown_request {
                request_shutdown(&ctx, peer, node_id);
            }
            break;
        }
    }

    let _ = conn.close().await;
    protocol.on_closed();
    debug!(%peer, "Session closed");
}

/// Applies a step's effect. Returns the requester when the step is a
/// shutdown request, so it can be signalled after the reply is sent.
fn apply_action(
    ctx: &AggregatorContext,
    protocol: &SessionProtocol,
    peer: SocketAddr,
    action: SessionAction,
) -> Option<Option<NodeId>> {
    match action {
        SessionAction::None => None,
        SessionAction::Established(node_id) => {
            ctx.stats.record_established();
            ctx.nodes.mark_online(&node_id, peer);
            info!(%peer, node_id = %node_id, "Session established");
            None
        }
        SessionAction::Rejected(e) => {
            ctx.stats.record_rejected();
            warn!(%peer, "Session rejected: {}", e);
            None
        }
        SessionAction::ProtocolViolation(e) => {
            ctx.stats.record_protocol_error();
            warn!(%peer, "Protocol error: {}", e);
            None
        }
        SessionAction::Enqueue { entry, parse_error } => {
            record_entry(ctx, protocol, peer, &entry, parse_error.as_ref());
            ctx.queue.enqueue(entry);
            None
        }
        SessionAction::Shutdown { node_id } => {
            if let Some(id) = &node_id {
                ctx.nodes.mark_offline(id);
            }
            Some(node_id)
        }
    }
}

fn record_entry(
    ctx: &AggregatorContext,
    protocol: &SessionProtocol,
    peer: SocketAddr,
    entry: &BatchEntry,
    parse_error: Option<&CoreError>,
) {
    ctx.stats.record_reading(parse_error.is_some());

    match (entry, parse_error) {
        (BatchEntry::Reading(reading), _) => {
            let declared = protocol.session().declared_node_id.as_ref();
            let in_region = reading.node_id.is_in(ctx.region());
            if declared.is_some_and(|d| d != &reading.node_id) {
                warn!(
                    %peer,
                    "Reading from {} arrived on session of {}",
                    reading.node_id,
                    declared.map(NodeId::as_str).unwrap_or_default()
                );
            } else if declared.is_none() && !in_region {
                warn!(
                    %peer,
                    node_id = %reading.node_id,
                    "Anonymous reading from outside region {}",
                    ctx.region()
                );
            }
            // Foreign ids are queued but never tracked, so the directory
            // only holds this region's nodes.
            if in_region {
                ctx.nodes.record_sync(&reading.node_id, reading.captured_at);
            }
            debug!(
                %peer,
                node_id = %reading.node_id,
                measurements = reading.measurements.len(),
                "Reading queued"
            );
        }
        (BatchEntry::Opaque(payload), Some(e)) => match sniff_node_id(payload) {
            Some(node_id) => warn!(%peer, %node_id, "Malformed reading queued as opaque: {}", e),
            None => warn!(%peer, "Malformed payload queued as opaque: {}", e),
        },
        (BatchEntry::Opaque(_), None) => {}
    }
}

fn request_shutdown(ctx: &AggregatorContext, peer: SocketAddr, node_id: Option<NodeId>) {
    if ctx.honor_peer_requests {
        ctx.shutdown.trigger(ShutdownCause::Peer {
            node_id,
            addr: peer,
        });
    } else {
        info!(
            %peer,
            "Ignoring shutdown request from {} (peer requests disabled)",
            node_id.as_ref().map_or("anonymous node", NodeId::as_str)
        );
    }
}

// ============================================
// Tests
// ============================================
