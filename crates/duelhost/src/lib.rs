//! # Duelhost
//!
//! A session server for two-sided card duels.
//!
//! Clients connect over raw TCP and speak a length-prefixed binary
//! protocol. They name themselves, create or join a room, ready up with a
//! deck, and play best-of-N matches against an external rules engine that
//! the room runs as a child process. Finished matches are published on an
//! event bus and recorded in a [`MatchRepository`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duelhost::prelude::*;
//!
//! # async fn start() -> Result<(), DuelhostError> {
//! let config = ServerConfig::default();
//! let server = DuelhostServerBuilder::from_config(&config)
//!     .repository(InMemoryMatchRepository::new())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod record_match;
mod repository;
mod server;

pub use config::{EngineConfig, ServerConfig};
pub use error::DuelhostError;
pub use record_match::RecordMatch;
pub use repository::{
    InMemoryMatchRepository, LEADERBOARD_KEY, MatchRepository, PersistenceError,
    RedisMatchRepository, duels_key,
};
pub use server::{DuelhostServer, DuelhostServerBuilder};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{
        DuelhostError, DuelhostServer, DuelhostServerBuilder, EngineConfig,
        InMemoryMatchRepository, MatchRepository, RecordMatch, RedisMatchRepository,
        ServerConfig,
    };

    pub use duelhost_events::{DomainEvent, EventBus, EventKind, GameOverData};
    pub use duelhost_protocol::RoomId;
    pub use duelhost_room::{EngineLauncher, ProcessLauncher};
}
