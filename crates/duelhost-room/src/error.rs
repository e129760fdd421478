//! Error types for the room layer.

use duelhost_protocol::{ProtocolError, RoomId, error_kind};
use duelhost_session::SessionError;
use duelhost_transport::ConnectionId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Every seat is taken, or the room stopped accepting players.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The join request's password didn't match.
    #[error("wrong password for room {0}")]
    WrongPassword(RoomId),

    /// The joining player has no name yet, or a seated player already
    /// uses it. Seat rows are matched to clients by name.
    #[error("name is empty or already seated in room {0}")]
    NameUnavailable(RoomId),

    /// The create-game request describes a room that can't exist.
    #[error("invalid room configuration: {0}")]
    InvalidConfig(String),

    /// `create_match` was called while a match is still being played.
    #[error("room {0} already has a match in progress")]
    MatchInProgress(RoomId),

    /// A duel winner outside teams 0 and 1.
    #[error("invalid team {0}")]
    InvalidTeam(u8),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// The `ErrorMsg` code a client gets when a join fails with this error.
    pub fn join_error_code(&self) -> u32 {
        match self {
            Self::WrongPassword(_) => error_kind::JOIN_WRONG_PASSWORD,
            Self::RoomFull(_) | Self::NameUnavailable(_) => error_kind::JOIN_FULL,
            _ => error_kind::JOIN_NOT_FOUND,
        }
    }
}

/// Errors raised inside a command strategy.
///
/// These never leave the router: it logs them and moves on to the next
/// frame. Nothing here closes a connection.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    /// The command came from a connection with no seat in this room.
    #[error("{0} is not seated in this room")]
    NotSeated(ConnectionId),

    /// The command is not valid for the sender.
    #[error("not allowed: {0}")]
    NotAllowed(&'static str),

    /// The command is not valid in the room's current state.
    #[error("command not valid while {0}")]
    WrongState(crate::DuelState),

    /// The command needs a running duel engine and there is none.
    #[error("no duel engine attached")]
    NoDuel,

    /// The command body didn't parse.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors at the duel engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine process could not be started.
    #[error("failed to spawn duel engine: {0}")]
    Spawn(#[source] std::io::Error),

    /// The child was spawned without one of its stdio pipes.
    #[error("duel engine {0} not piped")]
    MissingPipe(&'static str),

    /// The engine's input is closed; it has exited or is shutting down.
    #[error("duel engine input closed")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_error_codes() {
        assert_eq!(RoomError::NotFound(RoomId(1)).join_error_code(), 0);
        assert_eq!(RoomError::WrongPassword(RoomId(1)).join_error_code(), 1);
        assert_eq!(RoomError::RoomFull(RoomId(1)).join_error_code(), 2);
        assert_eq!(RoomError::NameUnavailable(RoomId(1)).join_error_code(), 2);
    }
}
