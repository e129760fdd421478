//! Unified error type for the duelhost server.

use duelhost_protocol::ProtocolError;
use duelhost_room::RoomError;
use duelhost_session::SessionError;
use duelhost_transport::TransportError;

use crate::PersistenceError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DuelhostError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A framing or decoding error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (not found, full, wrong password).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The match repository failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Reading the config file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`ServerConfig`](crate::ServerConfig).
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}
