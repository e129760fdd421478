//! The `GameOver` subscriber that writes match results to a repository.

use duelhost_events::{DomainEvent, EventError, EventHandler, GameOverData};

use crate::MatchRepository;

/// Records every finished match: one history entry and one leaderboard
/// increment per player.
///
/// The event bus calls handlers on the room's task, so `handle` only
/// spawns the writes. A failed write is logged and dropped; the match is
/// already over and nothing is rolled back.
#[derive(Debug, Clone)]
pub struct RecordMatch<R> {
    repository: R,
}

impl<R: MatchRepository + Clone> RecordMatch<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Writes `game` for every player. Returns the number of failed
    /// writes.
    pub async fn record(&self, game: &GameOverData) -> usize {
        let room_id = game.room_id;
        let mut failed = 0;
        for player in &game.players {
            if let Err(e) = self.repository.save_match(&player.name, game).await {
                tracing::warn!(%room_id, player = %player.name, error = %e, "failed to save match");
                failed += 1;
            }
            if let Err(e) = self
                .repository
                .increment_player_score(&player.name, player.points)
                .await
            {
                tracing::warn!(%room_id, player = %player.name, error = %e, "failed to update leaderboard");
                failed += 1;
            }
        }
        tracing::debug!(%room_id, players = game.players.len(), failed, "match recorded");
        failed
    }
}

impl<R: MatchRepository + Clone> EventHandler for RecordMatch<R> {
    fn handle(&self, event: &DomainEvent) -> Result<(), EventError> {
        let DomainEvent::GameOver(game) = event;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EventError::Handler(e.to_string()))?;

        let recorder = self.clone();
        let game = game.clone();
        runtime.spawn(async move {
            recorder.record(&game).await;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::InMemoryMatchRepository;
    use duelhost_events::{EventBus, EventKind, MatchOutcome, PlayerResult};
    use duelhost_protocol::RoomId;

    fn game() -> GameOverData {
        GameOverData {
            room_id: RoomId(4),
            winner_team: 1,
            score: [1, 2],
            best_of: 3,
            players: vec![
                PlayerResult {
                    name: "Kaiba".into(),
                    team: 0,
                    outcome: MatchOutcome::Lose,
                    points: 0,
                },
                PlayerResult {
                    name: "Mai".into(),
                    team: 1,
                    outcome: MatchOutcome::Win,
                    points: 1,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_record_writes_every_player() {
        let repo = InMemoryMatchRepository::new();
        let failed = RecordMatch::new(repo.clone()).record(&game()).await;

        assert_eq!(failed, 0);
        assert_eq!(repo.duels("Kaiba").len(), 1);
        assert_eq!(repo.duels("Mai")[0].score, [1, 2]);
        assert_eq!(repo.score("Mai"), 1);
        assert_eq!(repo.score("Kaiba"), 0);
    }

    #[tokio::test]
    async fn test_published_game_over_is_recorded() {
        let repo = InMemoryMatchRepository::new();
        let bus = EventBus::new();
        bus.subscribe(EventKind::GameOver, RecordMatch::new(repo.clone()));

        let report = bus.publish(&DomainEvent::GameOver(game()));
        assert_eq!(report.failed, 0);

        tokio::time::timeout(Duration::from_secs(2), async {
            while repo.score("Mai") == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("match never recorded");
        assert_eq!(repo.duels("Kaiba").len(), 1);
    }

    #[test]
    fn test_handle_outside_runtime_fails_cleanly() {
        let handler = RecordMatch::new(InMemoryMatchRepository::new());
        let err = handler.handle(&DomainEvent::GameOver(game())).unwrap_err();
        assert!(matches!(err, EventError::Handler(_)));
    }
}
