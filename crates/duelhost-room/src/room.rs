//! The room entity: seats, connected clients, duel state, and match.
//!
//! `Room` is plain data plus the primitives the command strategies
//! compose. It does no I/O of its own beyond queueing messages on client
//! channels, and it is never shared: the room actor owns it and runs one
//! command against it at a time.

use duelhost_protocol::{CreateGameRequest, Deck, HostInfo, RoomId, ServerMessage};
use duelhost_session::Client;
use duelhost_transport::ConnectionId;
use serde::Serialize;

use crate::config::clean_name;
use crate::engine::DuelHandle;
use crate::match_tracker::{Match, MatchScore};
use crate::{DuelState, RoomConfig, RoomError};

/// A seat row: who sits where, and the deck they submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatedUser {
    #[serde(rename = "pos")]
    pub position: u8,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck: Option<Deck>,
}

/// A duel room.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    config: RoomConfig,
    users: Vec<SeatedUser>,
    clients: Vec<Client>,
    state: DuelState,
    duel: Option<DuelHandle>,
    active_match: Option<Match>,
    turn_chooser: Option<ConnectionId>,
}

impl Room {
    /// Builds a room in `Waiting` with `creator` seated at position 0.
    ///
    /// # Errors
    /// Returns [`RoomError::InvalidConfig`] if the request describes an
    /// impossible room (see [`RoomConfig::from_request`]).
    pub fn create_from_request(
        req: &CreateGameRequest,
        creator: &str,
        id: RoomId,
    ) -> Result<Self, RoomError> {
        let config = RoomConfig::from_request(req)?;
        Ok(Self {
            id,
            config,
            users: vec![SeatedUser {
                position: 0,
                name: clean_name(creator),
                deck: None,
            }],
            clients: Vec::new(),
            state: DuelState::Waiting,
            duel: None,
            active_match: None,
            turn_chooser: None,
        })
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn host_info(&self) -> &HostInfo {
        &self.config.host
    }

    pub fn state(&self) -> DuelState {
        self.state
    }

    pub fn users(&self) -> &[SeatedUser] {
        &self.users
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn client(&self, conn_id: ConnectionId) -> Option<&Client> {
        self.clients.iter().find(|c| c.conn_id() == conn_id)
    }

    pub fn client_mut(&mut self, conn_id: ConnectionId) -> Option<&mut Client> {
        self.clients.iter_mut().find(|c| c.conn_id() == conn_id)
    }

    /// The team a seat belongs to.
    pub fn team_of(&self, position: u8) -> u8 {
        self.config.team_of(position)
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    /// The lowest seat with no user in it, if the room has one.
    pub fn free_position(&self) -> Option<u8> {
        (0..self.config.capacity())
            .find(|pos| !self.users.iter().any(|u| u.position == *pos))
    }

    /// Seats `name` at `position`. Returns `false` (and changes nothing)
    /// if the seat is taken or out of range.
    pub fn seat_user(&mut self, position: u8, name: &str) -> bool {
        if position >= self.config.capacity()
            || self.users.iter().any(|u| u.position == position)
        {
            return false;
        }
        self.users.push(SeatedUser {
            position,
            name: clean_name(name),
            deck: None,
        });
        self.users.sort_by_key(|u| u.position);
        true
    }

    /// `true` if a seat row already carries `name` once cleaned.
    pub fn is_name_seated(&self, name: &str) -> bool {
        let name = clean_name(name);
        self.users.iter().any(|u| u.name == name)
    }

    /// Adds a connected client.
    ///
    /// The client's frames reach this room through the room actor, which
    /// runs them against the room one at a time.
    pub fn add_client(&mut self, client: Client) {
        tracing::debug!(
            room_id = %self.id,
            conn_id = %client.conn_id(),
            position = client.position(),
            "client added"
        );
        self.clients.push(client);
    }

    /// Removes the client on `conn_id` and the seat row with its name.
    ///
    /// Returns the removed client. If no client matches, nothing changes
    /// and `None` comes back, so calling this twice, or for a connection
    /// that never joined, is harmless.
    pub fn remove_player(&mut self, conn_id: ConnectionId) -> Option<Client> {
        let index = self.clients.iter().position(|c| c.conn_id() == conn_id)?;
        let client = self.clients.remove(index);
        self.users.retain(|u| u.name != client.name());
        if self.turn_chooser == Some(conn_id) {
            self.turn_chooser = None;
        }
        tracing::info!(
            room_id = %self.id,
            %conn_id,
            position = client.position(),
            remaining = self.clients.len(),
            "player removed"
        );
        Some(client)
    }

    // -----------------------------------------------------------------
    // Decks and duel state
    // -----------------------------------------------------------------

    /// Attaches `deck` to the user at `position`. No-op for an empty seat.
    pub fn set_decks_to_player(&mut self, position: u8, deck: Deck) {
        if let Some(user) = self.users.iter_mut().find(|u| u.position == position) {
            user.deck = Some(deck);
        }
    }

    /// `true` if every seat is filled and every user has a deck.
    pub fn all_decks_submitted(&self) -> bool {
        self.users.len() == usize::from(self.config.capacity())
            && self.users.iter().all(|u| u.deck.is_some())
    }

    /// `true` if every seat is filled by a ready client.
    pub fn all_clients_ready(&self) -> bool {
        self.clients.len() == usize::from(self.config.capacity())
            && self.clients.iter().all(Client::is_ready)
    }

    /// Decks in seat order. Empty seats give empty decks.
    pub fn decks(&self) -> Vec<Deck> {
        (0..self.config.capacity())
            .map(|pos| {
                self.users
                    .iter()
                    .find(|u| u.position == pos)
                    .and_then(|u| u.deck.clone())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Enters the between-duels phase and clears every ready flag, so each
    /// seat has to resubmit its deck.
    pub fn side_decking(&mut self) {
        self.state = DuelState::SideDecking;
        for client in &mut self.clients {
            client.set_ready(false);
        }
        tracing::info!(room_id = %self.id, "side decking");
    }

    /// Attaches a running duel engine and enters `Dueling`.
    pub fn set_duel(&mut self, duel: DuelHandle) {
        self.duel = Some(duel);
        self.state = DuelState::Dueling;
    }

    /// The running duel engine, if there is one.
    pub fn duel(&self) -> Option<&DuelHandle> {
        self.duel.as_ref()
    }

    /// Detaches the duel engine. Dropping the handle stops the process.
    pub fn take_duel(&mut self) -> Option<DuelHandle> {
        self.duel.take()
    }

    pub fn set_client_who_chooses_turn(&mut self, conn_id: ConnectionId) {
        self.turn_chooser = Some(conn_id);
    }

    pub fn client_who_chooses_turn(&self) -> Option<&Client> {
        self.turn_chooser.and_then(|id| self.client(id))
    }

    // -----------------------------------------------------------------
    // Match
    // -----------------------------------------------------------------

    /// Starts a best-of-N match using the room's `best_of`.
    ///
    /// # Errors
    /// Returns [`RoomError::MatchInProgress`] if a match exists and isn't
    /// finished; the existing match is kept.
    pub fn create_match(&mut self) -> Result<(), RoomError> {
        if self.active_match.as_ref().is_some_and(|m| !m.is_finished()) {
            return Err(RoomError::MatchInProgress(self.id));
        }
        self.active_match = Some(Match::new(self.config.best_of()));
        tracing::info!(room_id = %self.id, best_of = self.config.best_of(), "match created");
        Ok(())
    }

    pub fn has_match(&self) -> bool {
        self.active_match.is_some()
    }

    /// Records a duel win. No-op when there is no match.
    pub fn duel_winner(&mut self, team: u8) -> Result<(), RoomError> {
        match &mut self.active_match {
            Some(m) => m.duel_winner(team),
            None => Ok(()),
        }
    }

    /// `true` if there is no match, or the match is decided.
    pub fn is_match_finished(&self) -> bool {
        self.active_match.as_ref().is_none_or(Match::is_finished)
    }

    /// The live score, or zeros when there is no match.
    pub fn match_score(&self) -> MatchScore {
        self.active_match
            .as_ref()
            .map(Match::score)
            .unwrap_or_default()
    }

    /// The team that took the match, if it is decided.
    pub fn match_winner(&self) -> Option<u8> {
        self.active_match.as_ref().and_then(Match::winner)
    }

    // -----------------------------------------------------------------
    // Messaging
    // -----------------------------------------------------------------

    /// Sends `msg` to every connected client, in join order.
    ///
    /// Clients whose connection is already gone are skipped; their
    /// disconnect will reach the room on its own.
    pub fn broadcast(&self, msg: &ServerMessage) {
        let frame = match msg.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(room_id = %self.id, error = %e, "failed to encode broadcast");
                return;
            }
        };
        for client in &self.clients {
            if let Err(e) = client.send_frame(frame.clone()) {
                tracing::debug!(room_id = %self.id, error = %e, "broadcast skipped client");
            }
        }
    }

    /// Sends `msg` to one client. Unknown connections are ignored.
    pub fn send_to(&self, conn_id: ConnectionId, msg: &ServerMessage) {
        if let Some(client) = self.client(conn_id) {
            if let Err(e) = client.send(msg) {
                tracing::debug!(room_id = %self.id, error = %e, "send skipped client");
            }
        }
    }

    /// The flat lobby view of this room.
    pub fn to_presentation(&self) -> RoomPresentation {
        let h = &self.config.host;
        RoomPresentation {
            roomid: self.id.0,
            roomname: self.config.name.clone(),
            roomnotes: self.config.notes.clone(),
            roommode: h.mode,
            needpass: self.config.need_pass,
            team1: h.team1,
            team2: h.team2,
            best_of: h.best_of,
            duel_flag: h.duel_flag,
            forbidden_types: h.forbidden_types,
            extra_rules: h.extra_rules,
            start_lp: h.start_lp,
            start_hand: h.start_hand,
            draw_count: h.draw_count,
            time_limit: h.time_limit,
            rule: h.rule,
            no_check: h.no_check_deck,
            no_shuffle: h.no_shuffle_deck,
            banlist_hash: h.banlist_hash,
            istart: self.state.as_str(),
            main_min: h.main_min,
            main_max: h.main_max,
            extra_min: h.extra_min,
            extra_max: h.extra_max,
            side_min: h.side_min,
            side_max: h.side_max,
            users: self
                .users
                .iter()
                .map(|u| PresentedUser {
                    pos: u.position,
                    name: u.name.clone(),
                })
                .collect(),
        }
    }
}

/// A room as the lobby lists it. Field names are what lobby clients read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomPresentation {
    pub roomid: u32,
    pub roomname: String,
    pub roomnotes: String,
    pub roommode: u8,
    pub needpass: bool,
    pub team1: i32,
    pub team2: i32,
    pub best_of: i32,
    pub duel_flag: u32,
    pub forbidden_types: i32,
    pub extra_rules: u16,
    pub start_lp: u32,
    pub start_hand: u8,
    pub draw_count: u8,
    pub time_limit: u16,
    pub rule: u8,
    pub no_check: bool,
    pub no_shuffle: bool,
    pub banlist_hash: u32,
    pub istart: &'static str,
    pub main_min: u16,
    pub main_max: u16,
    pub extra_min: u16,
    pub extra_max: u16,
    pub side_min: u16,
    pub side_max: u16,
    pub users: Vec<PresentedUser>,
}

/// A seated user in the lobby view. Decks stay private.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentedUser {
    pub pos: u8,
    pub name: String,
}
