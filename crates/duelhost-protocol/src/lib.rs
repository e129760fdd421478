//! Wire protocol for duelhost.
//!
//! This crate defines how bytes on a duel connection turn into commands:
//!
//! - **Framing** ([`FrameDecoder`], [`encode_frame`]): the u16
//!   length-prefixed envelope used by clients and by the duel engine.
//! - **Commands** ([`ClientCommand`], [`ServerCommand`]): the one-byte
//!   code at the front of every payload.
//! - **Messages** ([`CreateGameRequest`], [`ServerMessage`], [`Deck`], ...):
//!   the fixed-layout bodies behind those codes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about sockets or rooms. It sits
//! between them:
//!
//! ```text
//! Transport (bytes) → Protocol (frames, commands) → Room (duel state)
//! ```

mod command;
mod deck;
mod error;
mod frame;
mod message;
mod types;
mod wire;

pub use command::{
    ClientCommand, ServerCommand, engine, error_kind, player_change,
    split_command,
};
pub use deck::{Deck, MAX_DECK_CARDS};
pub use error::ProtocolError;
pub use frame::{
    DEFAULT_MAX_FRAME_LEN, FrameDecoder, HEADER_LEN, MAX_WIRE_FRAME_LEN,
    encode_frame,
};
pub use message::{
    CHAT_UNITS, CreateGameRequest, HOST_INFO_LEN, HostInfo, JoinGameRequest,
    NAME_UNITS, NOTES_UNITS, PASSWORD_UNITS, PlayerInfo, ServerMessage,
    client_frame, decode_chat, decode_turn_choice,
};
pub use types::RoomId;
