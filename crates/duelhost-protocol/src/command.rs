//! Command codes: the first byte of every frame payload.
//!
//! The numbering is fixed by the existing duel clients, so these values
//! must never change.

use bytes::Bytes;

/// Commands a client sends to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientCommand {
    /// A reply to an engine prompt, forwarded to the duel engine.
    Response = 0x01,
    /// A deck submission (main + side card codes).
    UpdateDeck = 0x02,
    /// The chooser's answer to "go first or second?".
    TurnChoice = 0x04,
    /// The client's display name.
    PlayerInfo = 0x10,
    /// Host a new room.
    CreateGame = 0x11,
    /// Join an existing room by id.
    JoinGame = 0x12,
    /// Leave the current room.
    LeaveGame = 0x13,
    /// Concede the current duel.
    Surrender = 0x14,
    /// Room chat.
    Chat = 0x16,
    /// Mark this seat ready (optionally carrying a deck).
    Ready = 0x22,
    /// Clear this seat's ready flag.
    NotReady = 0x23,
    /// Host asks to start the duel.
    Start = 0x25,
}

impl ClientCommand {
    /// All known client commands.
    pub const ALL: [ClientCommand; 12] = [
        Self::Response,
        Self::UpdateDeck,
        Self::TurnChoice,
        Self::PlayerInfo,
        Self::CreateGame,
        Self::JoinGame,
        Self::LeaveGame,
        Self::Surrender,
        Self::Chat,
        Self::Ready,
        Self::NotReady,
        Self::Start,
    ];

    /// Looks up a command by its wire code. Unknown codes return `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// The wire code.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Commands the server sends to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerCommand {
    GameMsg = 0x01,
    ErrorMsg = 0x02,
    ChooseOrder = 0x04,
    ChangeSide = 0x07,
    JoinGame = 0x12,
    TypeChange = 0x13,
    DuelStart = 0x15,
    DuelEnd = 0x16,
    Chat = 0x19,
    PlayerEnter = 0x20,
    PlayerChange = 0x21,
}

impl ServerCommand {
    /// The wire code.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Status bytes carried by [`ServerCommand::PlayerChange`].
///
/// The client reads the high nibble as a seat and the low nibble as the
/// change, but the ready/not-ready values are only ever sent as these
/// exact constants.
pub mod player_change {
    /// Seat 0 became ready.
    pub const READY_HOST: u8 = 9;
    /// Any other seat became ready.
    pub const READY_GUEST: u8 = 25;
    /// Seat 0 is no longer ready.
    pub const NOT_READY_HOST: u8 = 10;
    /// Any other seat is no longer ready.
    pub const NOT_READY_GUEST: u8 = 26;
    /// Low nibble for "this seat left".
    pub const LEAVE: u8 = 0x0b;

    /// Status for a ready toggle at `position`.
    pub fn ready(position: u8) -> u8 {
        if position == 0 { READY_HOST } else { READY_GUEST }
    }

    /// Status for a not-ready toggle at `position`.
    pub fn not_ready(position: u8) -> u8 {
        if position == 0 {
            NOT_READY_HOST
        } else {
            NOT_READY_GUEST
        }
    }

    /// Status announcing that `position` left the room.
    pub fn leave(position: u8) -> u8 {
        (position << 4) | LEAVE
    }
}

/// Error kinds carried by [`ServerCommand::ErrorMsg`].
pub mod error_kind {
    /// Joining or creating a room failed; the code says why.
    pub const JOIN_ERROR: u8 = 0x01;

    /// The requested room does not exist.
    pub const JOIN_NOT_FOUND: u32 = 0;
    /// The password did not match.
    pub const JOIN_WRONG_PASSWORD: u32 = 1;
    /// Every seat is taken, or the room is no longer waiting for players.
    pub const JOIN_FULL: u32 = 2;
}

/// Codes on the duel engine's stdio.
pub mod engine {
    /// Server → engine: set up and start a duel.
    pub const START: u8 = 0x00;
    /// Server → engine: a player's response to a prompt.
    pub const RESPONSE: u8 = 0x01;

    /// Engine → server: the duel is over. Body: `team u8, reason u8`.
    pub const MSG_WIN: u8 = 0x05;
}

/// Splits a frame payload into its command code and body.
///
/// Returns `None` for an empty payload, which carries no command.
pub fn split_command(payload: &Bytes) -> Option<(u8, Bytes)> {
    let code = *payload.first()?;
    Some((code, payload.slice(1..)))
}
