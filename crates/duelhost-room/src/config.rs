//! Room configuration and duel state.

use duelhost_protocol::{CreateGameRequest, HostInfo};
use serde::Serialize;

use crate::RoomError;

/// Duel flags every room advertises, whatever the host asked for.
pub const DUEL_FLAG: u32 = 853_504;

/// Largest team the duel clients can seat.
pub const MAX_TEAM_SIZE: i32 = 3;

/// The fixed part of a room, taken from the create-game request.
///
/// Nothing here changes after creation.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub name: String,
    pub notes: String,
    pub password: String,
    /// `true` if the host sent a non-empty password field.
    pub need_pass: bool,
    /// Rules as the host sent them, except for `duel_flag`, which is
    /// forced to [`DUEL_FLAG`]. Echoed to every client that joins.
    pub host: HostInfo,
}

impl RoomConfig {
    /// Builds and validates the configuration for a new room.
    ///
    /// # Errors
    /// Returns [`RoomError::InvalidConfig`] if either team size is outside
    /// `1..=MAX_TEAM_SIZE` or `best_of` is not positive.
    pub fn from_request(req: &CreateGameRequest) -> Result<Self, RoomError> {
        let host = &req.host;
        for (label, size) in [("team1", host.team1), ("team2", host.team2)] {
            if !(1..=MAX_TEAM_SIZE).contains(&size) {
                return Err(RoomError::InvalidConfig(format!(
                    "{label} size {size} outside 1..={MAX_TEAM_SIZE}"
                )));
            }
        }
        if host.best_of < 1 {
            return Err(RoomError::InvalidConfig(format!(
                "best_of must be positive, got {}",
                host.best_of
            )));
        }

        let mut host = host.clone();
        host.duel_flag = DUEL_FLAG;
        Ok(Self {
            name: clean_name(&req.name),
            notes: req.notes.clone(),
            password: req.password.clone(),
            need_pass: req.password_set,
            host,
        })
    }

    /// Seats on team 0.
    pub fn team1(&self) -> u8 {
        self.host.team1 as u8
    }

    /// Seats on team 1.
    pub fn team2(&self) -> u8 {
        self.host.team2 as u8
    }

    /// Total seats.
    pub fn capacity(&self) -> u8 {
        self.team1() + self.team2()
    }

    pub fn best_of(&self) -> u32 {
        self.host.best_of as u32
    }

    /// The team a seat belongs to: the first `team1` seats are team 0.
    pub fn team_of(&self, position: u8) -> u8 {
        if position < self.team1() { 0 } else { 1 }
    }

    /// Checks a join password. Rooms without a password accept anything.
    pub fn password_matches(&self, password: &str) -> bool {
        !self.need_pass || self.password == password
    }
}

/// Strips NULs and surrounding whitespace from a name off the wire.
pub fn clean_name(raw: &str) -> String {
    raw.replace('\0', "").trim().to_string()
}

/// Where a room is in its duel lifecycle.
///
/// ```text
/// Waiting ──(turn order chosen)──→ Dueling ──(duel over, match not)──→ SideDecking
///                                     ↑                                     │
///                                     └──────(turn order chosen)────────────┘
/// ```
///
/// When a duel ends and the match is decided, the room actor stops; there
/// is no state for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DuelState {
    /// Open for players; seats pick decks and ready up.
    Waiting,
    /// Between duels of a match; seats may swap side deck cards.
    SideDecking,
    /// The duel engine is running.
    Dueling,
}

impl DuelState {
    /// The lobby label for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::SideDecking => "sideDecking",
            Self::Dueling => "dueling",
        }
    }

    /// Returns `true` if the room still takes new players.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl std::fmt::Display for DuelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
