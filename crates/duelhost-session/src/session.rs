//! The per-connection session record.

use std::net::SocketAddr;

use duelhost_protocol::RoomId;
use duelhost_transport::ConnectionId;

/// Where a connection is in its lifecycle.
///
/// ```text
///   Lobby ──(create/join)──→ InRoom ──(leave)──→ Lobby
///     │                        │
///     └────────(close)─────────┴──→ removed
/// ```
///
/// There is no `Closed` state: closing removes the session, which is
/// what makes a second close a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, not seated anywhere.
    Lobby,
    /// Seated in `room`.
    InRoom { room: RoomId },
}

/// The server's record of one live connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub conn_id: ConnectionId,
    pub remote_addr: SocketAddr,
    /// The name announced with `PlayerInfo`, if any yet.
    pub name: Option<String>,
    pub state: SessionState,
}

impl Session {
    pub(crate) fn new(conn_id: ConnectionId, remote_addr: SocketAddr) -> Self {
        Self {
            conn_id,
            remote_addr,
            name: None,
            state: SessionState::Lobby,
        }
    }

    /// The room this connection last joined, if it is still in one.
    pub fn room(&self) -> Option<RoomId> {
        match self.state {
            SessionState::InRoom { room } => Some(room),
            SessionState::Lobby => None,
        }
    }
}
