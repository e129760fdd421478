//! Typed command bodies.
//!
//! Client → server bodies are parsed from the bytes after the command
//! code; server → client messages encode to complete frames, header
//! included, ready to write to a socket.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::wire::{ensure, read_utf16, read_utf16_rest, write_utf16};
use crate::{ProtocolError, ServerCommand, encode_frame};

/// Width of a player or room name, in UTF-16 code units.
pub const NAME_UNITS: usize = 20;
/// Width of a room password, in UTF-16 code units.
pub const PASSWORD_UNITS: usize = 20;
/// Width of a room's notes, in UTF-16 code units.
pub const NOTES_UNITS: usize = 200;
/// Longest chat line relayed, in UTF-16 code units.
pub const CHAT_UNITS: usize = 256;
/// Encoded size of [`HostInfo`].
pub const HOST_INFO_LEN: usize = 64;

// ---------------------------------------------------------------------------
// HostInfo
// ---------------------------------------------------------------------------

/// A room's rule configuration as it travels on the wire.
///
/// Sent by the host inside a create-game request and echoed back to
/// every client that joins. Layout (little-endian, 64 bytes):
///
/// ```text
///  0 banlist_hash u32     20 handshake u32       48 extra_rules u16
///  4 rule u8              24 version u32         50 main_min u16
///  5 mode u8              28 team1 i32           52 main_max u16
///  6 duel_rule u8         32 team2 i32           54 extra_min u16
///  7 no_check_deck u8     36 best_of i32         56 extra_max u16
///  8 no_shuffle_deck u8   40 duel_flag u32       58 side_min u16
///  9 (3 bytes padding)    44 forbidden_types i32 60 side_max u16
/// 12 start_lp u32                                62 (2 bytes padding)
/// 16 start_hand u8
/// 17 draw_count u8
/// 18 time_limit u16
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    pub banlist_hash: u32,
    pub rule: u8,
    pub mode: u8,
    pub duel_rule: u8,
    pub no_check_deck: bool,
    pub no_shuffle_deck: bool,
    pub start_lp: u32,
    pub start_hand: u8,
    pub draw_count: u8,
    pub time_limit: u16,
    pub handshake: u32,
    pub version: u32,
    pub team1: i32,
    pub team2: i32,
    pub best_of: i32,
    pub duel_flag: u32,
    pub forbidden_types: i32,
    pub extra_rules: u16,
    pub main_min: u16,
    pub main_max: u16,
    pub extra_min: u16,
    pub extra_max: u16,
    pub side_min: u16,
    pub side_max: u16,
}

impl HostInfo {
    /// Parses the 64-byte host info block.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        ensure(buf, HOST_INFO_LEN, "host info")?;
        let banlist_hash = buf.get_u32_le();
        let rule = buf.get_u8();
        let mode = buf.get_u8();
        let duel_rule = buf.get_u8();
        let no_check_deck = buf.get_u8() != 0;
        let no_shuffle_deck = buf.get_u8() != 0;
        buf.advance(3);
        let start_lp = buf.get_u32_le();
        let start_hand = buf.get_u8();
        let draw_count = buf.get_u8();
        let time_limit = buf.get_u16_le();
        let handshake = buf.get_u32_le();
        let version = buf.get_u32_le();
        let team1 = buf.get_i32_le();
        let team2 = buf.get_i32_le();
        let best_of = buf.get_i32_le();
        let duel_flag = buf.get_u32_le();
        let forbidden_types = buf.get_i32_le();
        let extra_rules = buf.get_u16_le();
        let main_min = buf.get_u16_le();
        let main_max = buf.get_u16_le();
        let extra_min = buf.get_u16_le();
        let extra_max = buf.get_u16_le();
        let side_min = buf.get_u16_le();
        let side_max = buf.get_u16_le();
        buf.advance(2);

        Ok(Self {
            banlist_hash,
            rule,
            mode,
            duel_rule,
            no_check_deck,
            no_shuffle_deck,
            start_lp,
            start_hand,
            draw_count,
            time_limit,
            handshake,
            version,
            team1,
            team2,
            best_of,
            duel_flag,
            forbidden_types,
            extra_rules,
            main_min,
            main_max,
            extra_min,
            extra_max,
            side_min,
            side_max,
        })
    }

    /// Encodes the 64-byte host info block.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.banlist_hash);
        buf.put_u8(self.rule);
        buf.put_u8(self.mode);
        buf.put_u8(self.duel_rule);
        buf.put_u8(u8::from(self.no_check_deck));
        buf.put_u8(u8::from(self.no_shuffle_deck));
        buf.put_bytes(0, 3);
        buf.put_u32_le(self.start_lp);
        buf.put_u8(self.start_hand);
        buf.put_u8(self.draw_count);
        buf.put_u16_le(self.time_limit);
        buf.put_u32_le(self.handshake);
        buf.put_u32_le(self.version);
        buf.put_i32_le(self.team1);
        buf.put_i32_le(self.team2);
        buf.put_i32_le(self.best_of);
        buf.put_u32_le(self.duel_flag);
        buf.put_i32_le(self.forbidden_types);
        buf.put_u16_le(self.extra_rules);
        buf.put_u16_le(self.main_min);
        buf.put_u16_le(self.main_max);
        buf.put_u16_le(self.extra_min);
        buf.put_u16_le(self.extra_max);
        buf.put_u16_le(self.side_min);
        buf.put_u16_le(self.side_max);
        buf.put_bytes(0, 2);
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Body of `PlayerInfo`: the client's display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub name: String,
}

impl PlayerInfo {
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        let name = read_utf16(buf, NAME_UNITS, "player name")?;
        Ok(Self {
            name: name.trim().to_string(),
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        write_utf16(buf, &self.name, NAME_UNITS);
    }
}

/// Body of `CreateGame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGameRequest {
    pub host: HostInfo,
    pub name: String,
    pub password: String,
    pub notes: String,
    /// `true` if any byte of the password field was non-zero.
    pub password_set: bool,
}

impl CreateGameRequest {
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        let host = HostInfo::decode(buf)?;
        let name = read_utf16(buf, NAME_UNITS, "room name")?;

        ensure(buf, PASSWORD_UNITS * 2, "room password")?;
        let raw = buf.copy_to_bytes(PASSWORD_UNITS * 2);
        let password_set = raw.iter().any(|&b| b != 0);
        let password = read_utf16(&mut raw.clone(), PASSWORD_UNITS, "room password")?;

        let notes = read_utf16(buf, NOTES_UNITS, "room notes")?;
        Ok(Self {
            host,
            name,
            password,
            notes,
            password_set,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        self.host.encode(buf);
        write_utf16(buf, &self.name, NAME_UNITS);
        write_utf16(buf, &self.password, PASSWORD_UNITS);
        write_utf16(buf, &self.notes, NOTES_UNITS);
    }
}

/// Body of `JoinGame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGameRequest {
    pub version: u16,
    pub room_id: u32,
    pub password: String,
}

impl JoinGameRequest {
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        ensure(buf, 8, "join header")?;
        let version = buf.get_u16_le();
        buf.advance(2);
        let room_id = buf.get_u32_le();
        let password = read_utf16(buf, PASSWORD_UNITS, "join password")?;
        Ok(Self {
            version,
            room_id,
            password,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(self.version);
        buf.put_bytes(0, 2);
        buf.put_u32_le(self.room_id);
        write_utf16(buf, &self.password, PASSWORD_UNITS);
    }
}

/// Body of `TurnChoice`: `true` means the chooser goes first.
pub fn decode_turn_choice(buf: &mut impl Buf) -> Result<bool, ProtocolError> {
    ensure(buf, 1, "turn choice")?;
    Ok(buf.get_u8() != 0)
}

/// Body of a client `Chat`: the message text.
pub fn decode_chat(buf: &mut impl Buf) -> String {
    let text = read_utf16_rest(buf);
    text.chars().take(CHAT_UNITS).collect()
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// A message from the server to one or more clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// A duel engine frame relayed verbatim.
    GameMsg(Bytes),
    /// Something the client asked for failed.
    ErrorMsg { kind: u8, code: u32 },
    /// "Do you want to go first?" sent to the turn chooser.
    ChooseOrder,
    /// The duel ended but the match did not: adjust decks.
    ChangeSide,
    /// The room's rules, sent once on join.
    JoinGame(HostInfo),
    /// The receiver's seat; bit 4 flags the host.
    TypeChange(u8),
    /// The duel phase begins.
    DuelStart,
    /// The match is over.
    DuelEnd,
    /// A chat line from the player at `position`.
    Chat { position: u16, text: String },
    /// A user sits down at `position`.
    PlayerEnter { name: String, position: u8 },
    /// A seat's status changed (see [`crate::player_change`]).
    PlayerChange { status: u8 },
}

impl ServerMessage {
    /// The command code this message travels under.
    pub fn command(&self) -> ServerCommand {
        match self {
            Self::GameMsg(_) => ServerCommand::GameMsg,
            Self::ErrorMsg { .. } => ServerCommand::ErrorMsg,
            Self::ChooseOrder => ServerCommand::ChooseOrder,
            Self::ChangeSide => ServerCommand::ChangeSide,
            Self::JoinGame(_) => ServerCommand::JoinGame,
            Self::TypeChange(_) => ServerCommand::TypeChange,
            Self::DuelStart => ServerCommand::DuelStart,
            Self::DuelEnd => ServerCommand::DuelEnd,
            Self::Chat { .. } => ServerCommand::Chat,
            Self::PlayerEnter { .. } => ServerCommand::PlayerEnter,
            Self::PlayerChange { .. } => ServerCommand::PlayerChange,
        }
    }

    /// Encodes the message as a complete frame (header + code + body).
    ///
    /// # Errors
    /// Returns [`ProtocolError::FrameTooLarge`] if a relayed engine frame
    /// is too big to wrap.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut payload = BytesMut::new();
        payload.put_u8(self.command().code());
        match self {
            Self::GameMsg(data) => payload.put_slice(data),
            Self::ErrorMsg { kind, code } => {
                payload.put_u8(*kind);
                payload.put_bytes(0, 3);
                payload.put_u32_le(*code);
            }
            Self::ChooseOrder
            | Self::ChangeSide
            | Self::DuelStart
            | Self::DuelEnd => {}
            Self::JoinGame(info) => info.encode(&mut payload),
            Self::TypeChange(kind) => payload.put_u8(*kind),
            Self::Chat { position, text } => {
                payload.put_u16_le(*position);
                let units = text.encode_utf16().count().min(CHAT_UNITS) + 1;
                write_utf16(&mut payload, text, units);
            }
            Self::PlayerEnter { name, position } => {
                write_utf16(&mut payload, name, NAME_UNITS);
                payload.put_u8(*position);
                payload.put_u8(0);
            }
            Self::PlayerChange { status } => payload.put_u8(*status),
        }
        encode_frame(&payload)
    }
}

/// Builds a client frame: code + body, with header. Used by tests and tools
/// that play the client side.
pub fn client_frame(
    code: u8,
    body: impl FnOnce(&mut BytesMut),
) -> Result<Bytes, ProtocolError> {
    let mut payload = BytesMut::new();
    payload.put_u8(code);
    body(&mut payload);
    encode_frame(&payload)
}
