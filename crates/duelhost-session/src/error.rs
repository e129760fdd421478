//! Error types for the session layer.

use duelhost_transport::ConnectionId;

/// Errors that can occur while tracking clients and sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given connection.
    #[error("no session for {0}")]
    NotFound(ConnectionId),

    /// A session was opened twice for the same connection.
    #[error("session already open for {0}")]
    AlreadyOpen(ConnectionId),

    /// The client's writer task has gone away, so nothing more can be
    /// delivered to it. The connection is already closing.
    #[error("outbound channel closed for {0}")]
    ChannelClosed(ConnectionId),

    /// A server message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] duelhost_protocol::ProtocolError),
}
