//! Seat readiness and deck submission.

use bytes::Buf;
use duelhost_protocol::{ClientCommand, Deck, ServerMessage, player_change};

use super::duel::side_deck_submitted;
use super::{Command, CommandStrategy, RoomContext};
use crate::{DuelState, StrategyError};

/// `Ready`: attach the optional trailing deck, announce the seat as
/// ready to everyone, then mark the client ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadyStrategy;

impl CommandStrategy for ReadyStrategy {
    fn commands(&self) -> &'static [ClientCommand] {
        &[ClientCommand::Ready]
    }

    fn execute(
        &self,
        ctx: &mut RoomContext<'_>,
        command: &Command,
    ) -> Result<(), StrategyError> {
        let position = ctx.position()?;
        let state = ctx.room.state();
        if state == DuelState::Dueling {
            return Err(StrategyError::WrongState(state));
        }

        let mut body = command.body();
        if body.has_remaining() {
            let deck = Deck::decode(&mut body)?;
            ctx.room.set_decks_to_player(position, deck);
        }

        ctx.room.broadcast(&ServerMessage::PlayerChange {
            status: player_change::ready(position),
        });
        ctx.client_mut()?.set_ready(true);
        tracing::debug!(room_id = %ctx.room.id(), position, "seat ready");

        if state == DuelState::SideDecking {
            side_deck_submitted(ctx)?;
        }
        Ok(())
    }
}

/// `NotReady`: clear the seat's ready flag and announce it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotReadyStrategy;

impl CommandStrategy for NotReadyStrategy {
    fn commands(&self) -> &'static [ClientCommand] {
        &[ClientCommand::NotReady]
    }

    fn execute(
        &self,
        ctx: &mut RoomContext<'_>,
        _command: &Command,
    ) -> Result<(), StrategyError> {
        let position = ctx.position()?;
        let state = ctx.room.state();
        if state != DuelState::Waiting {
            return Err(StrategyError::WrongState(state));
        }

        ctx.room.broadcast(&ServerMessage::PlayerChange {
            status: player_change::not_ready(position),
        });
        ctx.client_mut()?.set_ready(false);
        Ok(())
    }
}

/// `UpdateDeck`: store the seat's deck.
///
/// While waiting this only records the deck for the next `Ready`. While
/// side decking it counts as the seat's resubmission.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateDeckStrategy;

impl CommandStrategy for UpdateDeckStrategy {
    fn commands(&self) -> &'static [ClientCommand] {
        &[ClientCommand::UpdateDeck]
    }

    fn execute(
        &self,
        ctx: &mut RoomContext<'_>,
        command: &Command,
    ) -> Result<(), StrategyError> {
        let position = ctx.position()?;
        let state = ctx.room.state();
        if state == DuelState::Dueling {
            return Err(StrategyError::WrongState(state));
        }

        let deck = Deck::decode(&mut command.body())?;
        tracing::debug!(
            room_id = %ctx.room.id(),
            position,
            cards = deck.len(),
            "deck submitted"
        );
        ctx.room.set_decks_to_player(position, deck);

        if state == DuelState::SideDecking {
            ctx.client_mut()?.set_ready(true);
            side_deck_submitted(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{CommandRouter, DispatchOutcome, Source};
    use crate::{ProcessLauncher, Room};
    use bytes::{BufMut, Bytes, BytesMut};
    use duelhost_events::EventBus;
    use duelhost_protocol::{CreateGameRequest, HostInfo, RoomId, ServerCommand};
    use duelhost_session::{Client, outbound_channel};
    use duelhost_transport::ConnectionId;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn room_with_two_seats() -> (Room, UnboundedReceiver<Bytes>, UnboundedReceiver<Bytes>) {
        let req = CreateGameRequest {
            host: HostInfo {
                team1: 1,
                team2: 1,
                best_of: 1,
                ..HostInfo::default()
            },
            name: "Room".into(),
            password: String::new(),
            notes: String::new(),
            password_set: false,
        };
        let mut room = Room::create_from_request(&req, "Yugi", RoomId(1)).unwrap();
        let (tx0, rx0) = outbound_channel();
        let (tx1, rx1) = outbound_channel();
        room.add_client(Client::new(ConnectionId::new(1), "Yugi", 0, tx0));
        room.seat_user(1, "Joey");
        room.add_client(Client::new(ConnectionId::new(2), "Joey", 1, tx1));
        (room, rx0, rx1)
    }

    fn dispatch(room: &mut Room, conn: u64, payload: Bytes) -> DispatchOutcome {
        let events = EventBus::new();
        let launcher = ProcessLauncher::new("unused-engine");
        let router = CommandRouter::with_default_strategies();
        let mut ctx = RoomContext::new(
            room,
            Source::Client(ConnectionId::new(conn)),
            &events,
            &launcher,
        );
        router.dispatch(&mut ctx, payload)
    }

    fn ready_payload(deck: Option<&Deck>) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(ClientCommand::Ready.code());
        if let Some(deck) = deck {
            deck.encode(&mut buf);
        }
        buf.freeze()
    }

    #[test]
    fn test_ready_from_host_sends_nine_and_marks_ready() {
        let (mut room, mut rx0, mut rx1) = room_with_two_seats();
        let outcome = dispatch(&mut room, 1, ready_payload(None));

        assert_eq!(outcome, DispatchOutcome::Handled);
        for rx in [&mut rx0, &mut rx1] {
            let frame = rx.try_recv().unwrap();
            assert_eq!(
                &frame[2..],
                &[ServerCommand::PlayerChange.code(), player_change::READY_HOST]
            );
        }
        assert!(room.client(ConnectionId::new(1)).unwrap().is_ready());
        assert!(!room.client(ConnectionId::new(2)).unwrap().is_ready());
    }

    #[test]
    fn test_ready_from_guest_sends_twenty_five_and_attaches_deck() {
        let (mut room, mut rx0, _rx1) = room_with_two_seats();
        let deck = Deck {
            main: vec![10, 11, 12],
            side: vec![13],
        };
        dispatch(&mut room, 2, ready_payload(Some(&deck)));

        let frame = rx0.try_recv().unwrap();
        assert_eq!(frame[3], player_change::READY_GUEST);
        assert!(room.client(ConnectionId::new(2)).unwrap().is_ready());
        assert_eq!(room.users()[1].deck.as_ref(), Some(&deck));
    }

    #[test]
    fn test_ready_with_bad_deck_changes_nothing() {
        let (mut room, mut rx0, _rx1) = room_with_two_seats();
        let payload = Bytes::from_static(&[0x22, 5, 0, 0, 0]);

        assert_eq!(dispatch(&mut room, 2, payload), DispatchOutcome::Failed);
        assert!(rx0.try_recv().is_err());
        assert!(!room.client(ConnectionId::new(2)).unwrap().is_ready());
    }

    #[test]
    fn test_ready_from_unseated_connection_fails() {
        let (mut room, _rx0, _rx1) = room_with_two_seats();
        assert_eq!(
            dispatch(&mut room, 9, ready_payload(None)),
            DispatchOutcome::Failed
        );
    }

    #[test]
    fn test_unknown_code_is_ignored() {
        let (mut room, mut rx0, _rx1) = room_with_two_seats();
        let outcome = dispatch(&mut room, 1, Bytes::from_static(&[0x7e, 1]));
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert!(rx0.try_recv().is_err());
    }
}
