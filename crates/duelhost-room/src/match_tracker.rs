//! Best-of-N win counting.

use serde::Serialize;

use crate::RoomError;

/// Duels won by each team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchScore {
    pub team0: u32,
    pub team1: u32,
}

impl MatchScore {
    pub fn wins(&self, team: u8) -> u32 {
        if team == 0 { self.team0 } else { self.team1 }
    }
}

/// A best-of-N series of duels.
#[derive(Debug, Clone)]
pub struct Match {
    best_of: u32,
    score: MatchScore,
}

impl Match {
    pub fn new(best_of: u32) -> Self {
        Self {
            best_of,
            score: MatchScore::default(),
        }
    }

    pub fn best_of(&self) -> u32 {
        self.best_of
    }

    pub fn score(&self) -> MatchScore {
        self.score
    }

    /// Records a duel won by `team`.
    ///
    /// # Errors
    /// Returns [`RoomError::InvalidTeam`] for a team other than 0 or 1;
    /// the score is left unchanged.
    pub fn duel_winner(&mut self, team: u8) -> Result<(), RoomError> {
        match team {
            0 => self.score.team0 += 1,
            1 => self.score.team1 += 1,
            other => return Err(RoomError::InvalidTeam(other)),
        }
        Ok(())
    }

    /// `true` once either team has won more than half of `best_of`.
    pub fn is_finished(&self) -> bool {
        self.winner().is_some()
    }

    /// The team that has taken the match, if any.
    pub fn winner(&self) -> Option<u8> {
        let needed = self.best_of / 2;
        if self.score.team0 > needed {
            Some(0)
        } else if self.score.team1 > needed {
            Some(1)
        } else {
            None
        }
    }
}
