// ============================================
// File: crates/tidelink-common/src/framing.rs
// ============================================
//! # Framing Contract
//!
//! Stream transports carry no length prefix: a frame ends either at the
//! data sentinel or because the bytes so far already form a control
//! token. The rule lives in the protocol crate; transports only ask.

/// Decides when accumulated stream bytes form a complete frame.
pub trait Framing: Send + Sync {
    /// Returns the length of the first complete frame in `buf`, if any.
    ///
    /// The returned length includes any terminator; bytes after it belong
    /// to the next frame.
    fn frame_len(&self, buf: &[u8]) -> Option<usize>;
}
