//! The session manager: every live connection and the room it is in.
//!
//! # Concurrency note
//!
//! `SessionManager` is a plain `HashMap`. The server wraps it in a mutex
//! and holds the lock only for a lookup or an update, never across an
//! await on a room.

use std::collections::HashMap;
use std::net::SocketAddr;

use duelhost_protocol::RoomId;
use duelhost_transport::ConnectionId;

use crate::{Session, SessionError, SessionState};

/// Tracks all live connections.
///
/// ## Lifecycle
///
/// ```text
/// open() ──→ set_name() ──→ enter_room() ──→ leave_room() ──→ close()
///   │                                                           │
///   └───────────────────────────(close)─────────────────────────┘
/// ```
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: HashMap<ConnectionId, Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly accepted connection.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyOpen`] if the id is already tracked.
    pub fn open(
        &mut self,
        conn_id: ConnectionId,
        remote_addr: SocketAddr,
    ) -> Result<&Session, SessionError> {
        if self.sessions.contains_key(&conn_id) {
            return Err(SessionError::AlreadyOpen(conn_id));
        }
        let session = self
            .sessions
            .entry(conn_id)
            .or_insert_with(|| Session::new(conn_id, remote_addr));
        tracing::debug!(%conn_id, %remote_addr, "session opened");
        Ok(session)
    }

    /// Stores the name the client announced.
    pub fn set_name(
        &mut self,
        conn_id: ConnectionId,
        name: impl Into<String>,
    ) -> Result<(), SessionError> {
        let session = self.get_mut(conn_id)?;
        session.name = Some(name.into());
        Ok(())
    }

    /// Marks the connection as seated in `room`.
    pub fn enter_room(
        &mut self,
        conn_id: ConnectionId,
        room: RoomId,
    ) -> Result<(), SessionError> {
        let session = self.get_mut(conn_id)?;
        session.state = SessionState::InRoom { room };
        tracing::debug!(%conn_id, %room, "session entered room");
        Ok(())
    }

    /// Returns the connection to the lobby. Returns the room it left, if
    /// it was in one.
    pub fn leave_room(
        &mut self,
        conn_id: ConnectionId,
    ) -> Result<Option<RoomId>, SessionError> {
        let session = self.get_mut(conn_id)?;
        let room = session.room();
        session.state = SessionState::Lobby;
        Ok(room)
    }

    /// Forgets the connection and returns its last known room.
    ///
    /// Safe to call any number of times: only the first call for a
    /// connection can return a room, later calls return `None`. This is
    /// what lets both a read error and the following close run the same
    /// cleanup without removing the player twice.
    pub fn close(&mut self, conn_id: ConnectionId) -> Option<RoomId> {
        let session = self.sessions.remove(&conn_id)?;
        tracing::debug!(%conn_id, "session closed");
        session.room()
    }

    pub fn get(&self, conn_id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&conn_id)
    }

    /// The room a connection is seated in, if any.
    pub fn room_of(&self, conn_id: ConnectionId) -> Option<RoomId> {
        self.sessions.get(&conn_id).and_then(Session::room)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn get_mut(
        &mut self,
        conn_id: ConnectionId,
    ) -> Result<&mut Session, SessionError> {
        self.sessions
            .get_mut(&conn_id)
            .ok_or(SessionError::NotFound(conn_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_open_and_name() {
        let mut mgr = SessionManager::new();
        let id = ConnectionId::new(1);
        mgr.open(id, addr()).unwrap();
        mgr.set_name(id, "Yugi").unwrap();

        let session = mgr.get(id).unwrap();
        assert_eq!(session.name.as_deref(), Some("Yugi"));
        assert_eq!(session.state, SessionState::Lobby);
        assert_eq!(session.remote_addr, addr());
    }

    #[test]
    fn test_open_twice_rejected() {
        let mut mgr = SessionManager::new();
        let id = ConnectionId::new(1);
        mgr.open(id, addr()).unwrap();
        assert!(matches!(
            mgr.open(id, addr()),
            Err(SessionError::AlreadyOpen(_))
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut mgr = SessionManager::new();
        let id = ConnectionId::new(3);
        mgr.open(id, addr()).unwrap();
        mgr.enter_room(id, RoomId(9)).unwrap();

        assert_eq!(mgr.close(id), Some(RoomId(9)));
        assert_eq!(mgr.close(id), None);
        assert!(mgr.is_empty());
    }

    #[test]
    fn test_close_unknown_connection_is_noop() {
        let mut mgr = SessionManager::new();
        assert_eq!(mgr.close(ConnectionId::new(99)), None);
    }

    #[test]
    fn test_leave_room_returns_to_lobby() {
        let mut mgr = SessionManager::new();
        let id = ConnectionId::new(4);
        mgr.open(id, addr()).unwrap();
        mgr.enter_room(id, RoomId(2)).unwrap();
        assert_eq!(mgr.room_of(id), Some(RoomId(2)));

        assert_eq!(mgr.leave_room(id).unwrap(), Some(RoomId(2)));
        assert_eq!(mgr.room_of(id), None);
        assert_eq!(mgr.close(id), None);
    }

    #[test]
    fn test_update_unknown_connection_fails() {
        let mut mgr = SessionManager::new();
        assert!(matches!(
            mgr.set_name(ConnectionId::new(5), "x"),
            Err(SessionError::NotFound(_))
        ));
    }
}
