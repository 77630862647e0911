// ============================================
// File: crates/tidelink-core/src/protocol/messages.rs
// ============================================
//! # Protocol Frames
//!
//! ## Creation Reason
//! Every frame on the wire is either a fixed token, a prefixed token
//! carrying text (`ID:`, `NACK:`), or a sentinel-terminated payload.
//! `Frame` gives those a type so the session logic can `match` on them.
//!
//! ## Main Functionality
//! - [`tokens`]: Literal token values
//! - [`Frame`]: Parsed frame and its encoding
//!
//! ## Token Table
//! | Token | Direction | Frame |
//! |-------|-----------|-------|
//! | `LIga` | node → aggr | `Connect` |
//! | `OK` | aggr → node | `Proceed` |
//! | `ID:<id>` | node → aggr | `Identify` |
//! | `ACK` | aggr → node | `Established` |
//! | `NACK:<reason>` | aggr → node | `Reject` |
//! | `DLG` | node → aggr | `Shutdown` |
//! | `<\|OK\|>` | aggr → node | `Accepted` |
//! | `<payload><\|EOM\|>` | any | `Data` |
//! | `<\|ACK\|>` | collector → aggr | `CollectorAck` |
//!
//! ## ⚠️ Important Note for Next Developer
//! - Tokens are case-sensitive; `liga` is NOT a connect request
//! - Trailing CR/LF is tolerated on control tokens only
//!
//! ## Last Modified
//! v0.1.0 - Initial frame definitions

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CoreError, Result};

// ============================================
// Tokens
// ============================================

/// Literal protocol tokens.
pub mod tokens {
    /// Session open request.
    pub const CONNECT: &str = "LIga";
    /// Proceed to identify.
    pub const PROCEED: &str = "OK";
    /// Prefix of the identity declaration.
    pub const ID_PREFIX: &str = "ID:";
    /// Session established.
    pub const ESTABLISHED: &str = "ACK";
    /// Prefix of a rejection.
    pub const REJECT_PREFIX: &str = "NACK:";
    /// Shutdown request.
    pub const SHUTDOWN: &str = "DLG";
    /// Reading accepted / shutdown acknowledged.
    pub const ACCEPTED: &str = "<|OK|>";
    /// Collector batch acknowledgement.
    pub const COLLECTOR_ACK: &str = "<|ACK|>";
    /// Data frame terminator.
    pub const EOM: &str = "<|EOM|>";

    /// Fixed (non-prefixed) tokens.
    pub const FIXED: [&str; 6] = [CONNECT, PROCEED, ESTABLISHED, SHUTDOWN, ACCEPTED, COLLECTOR_ACK];
}

// ============================================
// Frame
// ============================================

/// One classified protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `LIga`
    Connect,
    /// `OK`
    Proceed,
    /// `ID:<node_id>`, raw declared identifier.
    Identify(String),
    /// `ACK`
    Established,
    /// `NACK:<reason>`
    Reject(String),
    /// `DLG`
    Shutdown,
    /// `<|OK|>`
    Accepted,
    /// Payload text before the `<|EOM|>` sentinel.
    Data(String),
    /// `<|ACK|>`
    CollectorAck,
}

impl Frame {
    /// Classifies raw frame bytes.
    ///
    /// # Errors
    /// Returns `MalformedFrame` for empty, non UTF-8, or unrecognised input.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CoreError::malformed(format!("not UTF-8: {e}")))?;

        if let Some(pos) = text.find(tokens::EOM) {
            return Ok(Self::Data(text[..pos].trim().to_string()));
        }

        let token = text.trim_end_matches(['\r', '\n']);
        let frame = match token {
            "" => return Err(CoreError::malformed("empty frame")),
            tokens::CONNECT => Self::Connect,
            tokens::PROCEED => Self::Proceed,
            tokens::ESTABLISHED => Self::Established,
            tokens::SHUTDOWN => Self::Shutdown,
            tokens::ACCEPTED => Self::Accepted,
            tokens::COLLECTOR_ACK => Self::CollectorAck,
            _ => {
                if let Some(id) = token.strip_prefix(tokens::ID_PREFIX) {
                    Self::Identify(id.trim().to_string())
                } else if let Some(reason) = token.strip_prefix(tokens::REJECT_PREFIX) {
                    Self::Reject(reason.to_string())
                } else {
                    return Err(CoreError::malformed(format!(
                        "unrecognised frame '{}'",
                        preview(token)
                    )));
                }
            }
        };
        Ok(frame)
    }

    /// Creates a data frame from a payload.
    pub fn data(payload: impl Into<String>) -> Self {
        Self::Data(payload.into())
    }

    /// Encodes this frame to wire bytes.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Appends the wire bytes of this frame to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Self::Connect => buf.put_slice(tokens::CONNECT.as_bytes()),
            Self::Proceed => buf.put_slice(tokens::PROCEED.as_bytes()),
            Self::Identify(id) => {
                buf.put_slice(tokens::ID_PREFIX.as_bytes());
                buf.put_slice(id.as_bytes());
            }
            Self::Established => buf.put_slice(tokens::ESTABLISHED.as_bytes()),
            Self::Reject(reason) => {
                buf.put_slice(tokens::REJECT_PREFIX.as_bytes());
                buf.put_slice(reason.as_bytes());
            }
            Self::Shutdown => buf.put_slice(tokens::SHUTDOWN.as_bytes()),
            Self::Accepted => buf.put_slice(tokens::ACCEPTED.as_bytes()),
            Self::Data(payload) => {
                buf.put_slice(payload.as_bytes());
                buf.put_slice(tokens::EOM.as_bytes());
            }
            Self::CollectorAck => buf.put_slice(tokens::COLLECTOR_ACK.as_bytes()),
        }
    }

    /// Short name used in logs and errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Proceed => "PROCEED",
            Self::Identify(_) => "IDENTIFY",
            Self::Established => "ESTABLISHED",
            Self::Reject(_) => "REJECT",
            Self::Shutdown => "SHUTDOWN",
            Self::Accepted => "ACCEPTED",
            Self::Data(_) => "DATA",
            Self::CollectorAck => "COLLECTOR_ACK",
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identify(id) => write!(f, "IDENTIFY({id})"),
            Self::Reject(reason) => write!(f, "REJECT({reason})"),
            Self::Data(payload) => write!(f, "DATA({} bytes)", payload.len()),
            other => f.write_str(other.kind()),
        }
    }
}

/// First characters of a frame for log and error messages.
fn preview(text: &str) -> &str {
    match text.char_indices().nth(32) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ============================================
// Tests
// ============================================
