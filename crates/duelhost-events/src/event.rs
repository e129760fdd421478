//! The events rooms publish.

use std::fmt;

use duelhost_protocol::RoomId;
use serde::{Deserialize, Serialize};

/// Event names, used as subscription keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GameOver,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GameOver => "game_over",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened in a room that the rest of the server may
/// care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A match finished.
    GameOver(GameOverData),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::GameOver(_) => EventKind::GameOver,
        }
    }
}

/// Win or loss, from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    Win,
    Lose,
}

/// One player's line in a finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    /// The player's name. Names are also the persistence key.
    pub name: String,
    pub team: u8,
    pub outcome: MatchOutcome,
    /// Leaderboard points earned by this match.
    pub points: u32,
}

/// Payload of [`DomainEvent::GameOver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverData {
    pub room_id: RoomId,
    pub winner_team: u8,
    /// Duels won by team 0 and team 1.
    pub score: [u32; 2],
    pub best_of: u32,
    pub players: Vec<PlayerResult>,
}

impl GameOverData {
    /// The result line for `name`, if that player took part.
    pub fn player(&self, name: &str) -> Option<&PlayerResult> {
        self.players.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_over_json_shape() {
        let event = DomainEvent::GameOver(GameOverData {
            room_id: RoomId(3),
            winner_team: 0,
            score: [2, 1],
            best_of: 3,
            players: vec![PlayerResult {
                name: "Yugi".into(),
                team: 0,
                outcome: MatchOutcome::Win,
                points: 1,
            }],
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "game_over");
        assert_eq!(json["room_id"], 3);
        assert_eq!(json["score"], serde_json::json!([2, 1]));
        assert_eq!(json["players"][0]["outcome"], "win");
        assert_eq!(event.kind().as_str(), "game_over");
    }
}
