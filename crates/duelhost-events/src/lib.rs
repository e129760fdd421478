//! Domain events and the event bus for duelhost.
//!
//! Rooms don't know how match results are stored. When a match ends the
//! room publishes a [`DomainEvent::GameOver`] on the [`EventBus`], and
//! whatever subscribed at startup (the persistence subscriber, in the
//! server) reacts to it.
//!
//! # Lifetime
//!
//! The bus is an ordinary value, not a global. The server builds one at
//! startup, registers every subscriber, and only then starts accepting
//! connections. Rooms receive it as an `Arc<EventBus>`.

mod bus;
mod error;
mod event;

pub use bus::{EventBus, EventHandler, PublishReport};
pub use error::EventError;
pub use event::{DomainEvent, EventKind, GameOverData, MatchOutcome, PlayerResult};
