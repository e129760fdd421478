//! Client and session bookkeeping for duelhost.
//!
//! This crate answers two questions about a connection:
//!
//! 1. **Who is on the other end, and where do they sit?** A [`Client`] is
//!    a named participant bound to one connection and, inside a room,
//!    one seat. The room owns its clients and talks to them through
//!    their outbound channel.
//! 2. **What do we remember about the connection itself?** The
//!    [`SessionManager`] maps every live connection to its remote
//!    address, the name it announced, and the last room it joined, so
//!    that a close can be routed back to the right room exactly once.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)     ← owns Clients, broadcasts through them
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below) ← ServerMessage, RoomId
//! ```

mod client;
mod error;
mod manager;
mod session;

pub use client::{Client, ClientSender, outbound_channel};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionState};
