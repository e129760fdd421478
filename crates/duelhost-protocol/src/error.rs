//! Error types for the protocol layer.
//!
//! Each crate in duelhost defines its own error enum. A `ProtocolError`
//! always means the bytes themselves were wrong: a frame header that
//! lies about its size, or a command body too short for its layout.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame header declared a payload larger than the configured bound.
    ///
    /// This is fatal for the connection: there is no way to resync a
    /// length-prefixed stream once a header can't be trusted.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// `take_message` was called without a complete frame buffered.
    #[error("no complete frame buffered")]
    Incomplete,

    /// A command body ended before all of its fields were read.
    #[error("truncated {what}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        what: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// The message parsed but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
