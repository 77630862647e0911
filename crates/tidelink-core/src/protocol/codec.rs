// ============================================
// File: crates/tidelink-core/src/protocol/codec.rs
// ============================================
//! # Protocol Codec
//!
//! ## Creation Reason
//! Provides the JSON encoding of data frames and the stream framing rule
//! that tells a transport where one frame ends.
//!
//! ## Main Functionality
//! - `Codec` trait: Generic encode/decode interface
//! - `JsonCodec`: `<json><|EOM|>` encoding for every `WireMessage`
//! - `SessionFraming`: `Framing` implementation for stream transports
//!
//! ## Framing Rules
//! 1. Bytes up to and including `<|EOM|>` form a data frame
//! 2. A buffer that is exactly a fixed token (CR/LF tolerated) is a frame
//! 3. A buffer starting with `ID:` or `NACK:` is a frame as read
//! 4. Anything else keeps accumulating until EOF
//!
//! ## ⚠️ Important Note for Next Developer
//! - Rule 3 assumes the peer writes a prefixed token in one write; every
//!   tidelink peer does, and the original nodes did too
//! - Encoded JSON must never contain the sentinel: a string value may
//!   hold it (sent escaped by the peer), so `encode` writes its `<` as
//!   `\u003c`. Outside strings JSON has no `<`, so the rewrite is exact.
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use tidelink_common::Framing;

use crate::error::{CoreError, Result};
use crate::protocol::messages::tokens;
use crate::protocol::models::{Batch, CollectorMessage, Reading, ShutdownNotice};

// ============================================
// Codec Trait
// ============================================

/// Trait for encoding and decoding protocol messages.
///
/// # Type Parameters
/// * `T` - The message type to encode/decode
pub trait Codec<T> {
    /// Encodes a message into a byte buffer, including any terminator.
    ///
    /// # Errors
    /// Returns `Encode` if the message cannot be serialized.
    fn encode(&self, msg: &T, buf: &mut BytesMut) -> Result<()>;

    /// Decodes a message from frame bytes, with or without terminator.
    ///
    /// # Errors
    /// Returns `InvalidReading` if the bytes are not a valid message.
    fn decode(&self, buf: &[u8]) -> Result<T>;
}

/// Message carried as sentinel-terminated JSON.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Checks invariants serde cannot express.
    ///
    /// # Errors
    /// Returns `InvalidReading` describing the first violation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl WireMessage for Reading {
    fn validate(&self) -> Result<()> {
        if self.node_id.as_str().trim().is_empty() {
            return Err(CoreError::invalid_reading("node_id is empty"));
        }
        if let Some(m) = self.measurements.iter().find(|m| m.kind.is_empty()) {
            return Err(CoreError::invalid_reading(format!(
                "measurement with value {} has no type",
                m.value
            )));
        }
        Ok(())
    }
}

impl WireMessage for Batch {}
impl WireMessage for ShutdownNotice {}
impl WireMessage for CollectorMessage {}

// ============================================
// JsonCodec
// ============================================

/// Codec for sentinel-terminated JSON messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Creates a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Serializes a message to a complete frame.
    ///
    /// # Errors
    /// Returns `Encode` if serialization fails.
    pub fn to_frame<T: WireMessage>(&self, msg: &T) -> Result<bytes::Bytes> {
        let mut buf = BytesMut::new();
        self.encode(msg, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Decodes a data payload (sentinel already stripped) as a `Reading`.
    ///
    /// # Errors
    /// Returns `InvalidReading` if the payload is not a valid reading.
    pub fn decode_reading(&self, payload: &str) -> Result<Reading> {
        self.decode(payload.as_bytes())
    }
}

impl<T: WireMessage> Codec<T> for JsonCodec {
    fn encode(&self, msg: &T, buf: &mut BytesMut) -> Result<()> {
        let json = serde_json::to_vec(msg).map_err(|e| CoreError::Encode {
            reason: e.to_string(),
        })?;
        buf.reserve(json.len() + tokens::EOM.len());
        put_without_sentinel(buf, &json);
        buf.put_slice(tokens::EOM.as_bytes());
        Ok(())
    }

    fn decode(&self, buf: &[u8]) -> Result<T> {
        let body = match find(buf, tokens::EOM.as_bytes()) {
            Some(pos) => &buf[..pos],
            None => buf,
        };
        let msg: T =
            serde_json::from_slice(body).map_err(|e| CoreError::invalid_reading(e.to_string()))?;
        msg.validate()?;
        Ok(msg)
    }
}

// ============================================
// SessionFraming
// ============================================

/// Stream framing rule for the tidelink protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionFraming;

impl Framing for SessionFraming {
    fn frame_len(&self, buf: &[u8]) -> Option<usize> {
        if let Some(pos) = find(buf, tokens::EOM.as_bytes()) {
            return Some(pos + tokens::EOM.len());
        }

        let trimmed = trim_line_end(buf);
        if trimmed.is_empty() {
            return None;
        }
        let is_token = tokens::FIXED.iter().any(|t| t.as_bytes() == trimmed)
            || prefixed(trimmed, tokens::ID_PREFIX)
            || prefixed(trimmed, tokens::REJECT_PREFIX);

        is_token.then_some(buf.len())
    }
}

/// Returns `true` if `buf` is `prefix` followed by at least one byte.
fn prefixed(buf: &[u8], prefix: &str) -> bool {
    buf.len() > prefix.len() && buf.starts_with(prefix.as_bytes())
}

fn trim_line_end(mut buf: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r' | b'\n'] = buf {
        buf = rest;
    }
    buf
}

/// Copies serialized JSON into `buf`, escaping the `<` of every
/// embedded sentinel so the frame cannot end early.
fn put_without_sentinel(buf: &mut BytesMut, mut json: &[u8]) {
    let sentinel = tokens::EOM.as_bytes();
    while let Some(pos) = find(json, sentinel) {
        buf.put_slice(&json[..pos]);
        buf.put_slice(ESCAPED_LT);
        json = &json[pos + 1..];
    }
    buf.put_slice(json);
}

const ESCAPED_LT: &[u8] = b"\\u003c";

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ============================================
// Tests
// ============================================
