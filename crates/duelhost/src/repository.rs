//! Where finished matches are recorded.
//!
//! Two stores implement [`MatchRepository`]: Redis for real deployments,
//! and an in-memory map for tests and for running without Redis.
//!
//! Redis layout:
//!
//! | key                 | type       | contents                          |
//! |---------------------|------------|-----------------------------------|
//! | `user:{name}:duels` | list       | JSON `GameOverData`, newest first |
//! | `leaderboard`       | sorted set | player name scored by match wins  |

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use duelhost_events::GameOverData;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Key of the leaderboard sorted set.
pub const LEADERBOARD_KEY: &str = "leaderboard";

/// Key of a player's match history list.
pub fn duels_key(player: &str) -> String {
    format!("user:{player}:duels")
}

/// Errors from a match repository.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The match record could not be serialized.
    #[error("failed to encode match record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Stores match results and leaderboard scores.
///
/// Both calls are made off the room's task; a slow store never holds up
/// a duel.
pub trait MatchRepository: Send + Sync + 'static {
    /// Appends `record` to `player`'s match history.
    fn save_match(
        &self,
        player: &str,
        record: &GameOverData,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Adds `delta` to `player`'s leaderboard score.
    fn increment_player_score(
        &self,
        player: &str,
        delta: u32,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

/// Redis-backed repository.
///
/// Cheap to clone: `ConnectionManager` multiplexes one connection and
/// reconnects on its own.
#[derive(Clone)]
pub struct RedisMatchRepository {
    conn: ConnectionManager,
}

impl RedisMatchRepository {
    /// Connects to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self, PersistenceError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!("connected to redis");
        Ok(Self { conn })
    }
}

impl MatchRepository for RedisMatchRepository {
    async fn save_match(
        &self,
        player: &str,
        record: &GameOverData,
    ) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = conn.lpush(duels_key(player), json).await;
        result?;
        Ok(())
    }

    async fn increment_player_score(
        &self,
        player: &str,
        delta: u32,
    ) -> Result<(), PersistenceError> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> =
            conn.zincr(LEADERBOARD_KEY, player, delta).await;
        result?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisMatchRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMatchRepository").finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct Records {
    duels: HashMap<String, Vec<GameOverData>>,
    scores: HashMap<String, u64>,
}

/// Repository that keeps everything in process memory.
///
/// Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMatchRepository {
    records: Arc<Mutex<Records>>,
}

impl InMemoryMatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// `player`'s match history, newest first.
    pub fn duels(&self, player: &str) -> Vec<GameOverData> {
        self.lock().duels.get(player).cloned().unwrap_or_default()
    }

    /// `player`'s leaderboard score. Unknown players score 0.
    pub fn score(&self, player: &str) -> u64 {
        self.lock().scores.get(player).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MatchRepository for InMemoryMatchRepository {
    async fn save_match(
        &self,
        player: &str,
        record: &GameOverData,
    ) -> Result<(), PersistenceError> {
        self.lock()
            .duels
            .entry(player.to_string())
            .or_default()
            .insert(0, record.clone());
        Ok(())
    }

    async fn increment_player_score(
        &self,
        player: &str,
        delta: u32,
    ) -> Result<(), PersistenceError> {
        *self.lock().scores.entry(player.to_string()).or_default() += u64::from(delta);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duelhost_events::{MatchOutcome, PlayerResult};
    use duelhost_protocol::RoomId;

    fn record(room: u32) -> GameOverData {
        GameOverData {
            room_id: RoomId(room),
            winner_team: 0,
            score: [1, 0],
            best_of: 1,
            players: vec![PlayerResult {
                name: "Yugi".into(),
                team: 0,
                outcome: MatchOutcome::Win,
                points: 1,
            }],
        }
    }

    #[test]
    fn test_duels_key_layout() {
        assert_eq!(duels_key("Yugi"), "user:Yugi:duels");
    }

    #[tokio::test]
    async fn test_in_memory_history_is_newest_first() {
        let repo = InMemoryMatchRepository::new();
        repo.save_match("Yugi", &record(1)).await.unwrap();
        repo.save_match("Yugi", &record(2)).await.unwrap();

        let duels = repo.duels("Yugi");
        assert_eq!(duels.len(), 2);
        assert_eq!(duels[0].room_id, RoomId(2));
        assert!(repo.duels("Joey").is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_scores_accumulate() {
        let repo = InMemoryMatchRepository::new();
        let shared = repo.clone();
        repo.increment_player_score("Yugi", 1).await.unwrap();
        repo.increment_player_score("Yugi", 0).await.unwrap();
        repo.increment_player_score("Yugi", 1).await.unwrap();

        assert_eq!(shared.score("Yugi"), 2);
        assert_eq!(shared.score("Joey"), 0);
    }
}
