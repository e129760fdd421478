//! Duel rooms for duelhost.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns the
//! room's seats, clients, match, and duel engine handle. Every frame a
//! client sends, and every frame the engine sends back, becomes one
//! command on the actor's queue and runs to completion before the next.
//!
//! # Key types
//!
//! - [`Room`]: the room entity and its state primitives
//! - [`Match`]: best-of-N win counting
//! - [`CommandStrategy`] / [`CommandRouter`]: the per-command state
//!   transitions and the table that picks one
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomManager`]: creates rooms, finds them, lists them
//! - [`EngineLauncher`] / [`ProcessLauncher`]: the duel engine boundary

mod actor;
mod config;
mod engine;
mod error;
mod manager;
mod match_tracker;
mod room;
pub mod strategy;

pub use actor::{JoinRequest, RoomHandle};
pub use config::{DUEL_FLAG, DuelState, MAX_TEAM_SIZE, RoomConfig};
pub use engine::{
    DuelHandle, DuelSetup, EngineEvent, EngineLauncher, EngineReceiver,
    ProcessLauncher,
};
pub use error::{EngineError, RoomError, StrategyError};
pub use manager::{RoomManager, close_empty_rooms};
pub use match_tracker::{Match, MatchScore};
pub use room::{PresentedUser, Room, RoomPresentation, SeatedUser};
pub use strategy::{CommandRouter, CommandStrategy, DispatchOutcome, RoomContext, Source};
