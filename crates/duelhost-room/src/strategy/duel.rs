//! Starting, playing, and ending duels.

use bytes::Buf;
use duelhost_events::{DomainEvent, GameOverData, MatchOutcome, PlayerResult};
use duelhost_protocol::{ClientCommand, ServerMessage, decode_turn_choice, engine};

use super::{Command, CommandStrategy, RoomContext};
use crate::engine::DuelSetup;
use crate::{DuelState, Room, StrategyError};

/// `Start`: the host starts the match once every seat is ready with a
/// deck. Creates the match, announces the duel, and asks the host to
/// pick the turn order.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartStrategy;

impl CommandStrategy for StartStrategy {
    fn commands(&self) -> &'static [ClientCommand] {
        &[ClientCommand::Start]
    }

    fn execute(
        &self,
        ctx: &mut RoomContext<'_>,
        _command: &Command,
    ) -> Result<(), StrategyError> {
        let conn_id = ctx.conn_id()?;
        if ctx.position()? != 0 {
            return Err(StrategyError::NotAllowed("only the host can start"));
        }
        let state = ctx.room.state();
        if state != DuelState::Waiting || ctx.room.has_match() {
            return Err(StrategyError::WrongState(state));
        }
        if !ctx.room.all_clients_ready() || !ctx.room.all_decks_submitted() {
            return Err(StrategyError::NotAllowed("not every seat is ready"));
        }

        ctx.room.create_match()?;
        ctx.room.broadcast(&ServerMessage::DuelStart);
        ctx.room.set_client_who_chooses_turn(conn_id);
        ctx.room.send_to(conn_id, &ServerMessage::ChooseOrder);
        tracing::info!(room_id = %ctx.room.id(), "match started");
        Ok(())
    }
}

/// `TurnChoice`: the chooser picks first or second; the engine starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnChoiceStrategy;

impl CommandStrategy for TurnChoiceStrategy {
    fn commands(&self) -> &'static [ClientCommand] {
        &[ClientCommand::TurnChoice]
    }

    fn execute(
        &self,
        ctx: &mut RoomContext<'_>,
        command: &Command,
    ) -> Result<(), StrategyError> {
        let conn_id = ctx.conn_id()?;
        let state = ctx.room.state();
        match state {
            DuelState::Waiting if ctx.room.has_match() => {}
            DuelState::SideDecking if ctx.room.all_clients_ready() => {}
            DuelState::SideDecking => {
                return Err(StrategyError::NotAllowed("side decks not submitted"));
            }
            _ => return Err(StrategyError::WrongState(state)),
        }
        let chooser = ctx
            .room
            .client_who_chooses_turn()
            .map(|c| (c.conn_id(), c.position()));
        let position = match chooser {
            Some((id, position)) if id == conn_id => position,
            _ => return Err(StrategyError::NotAllowed("not the turn chooser")),
        };

        let go_first = decode_turn_choice(&mut command.body())?;
        let chooser_team = ctx.room.team_of(position);
        let first_team = if go_first { chooser_team } else { 1 - chooser_team };

        let setup = duel_setup(ctx.room, first_team);
        let (handle, events) = ctx.launcher().launch(&setup)?;
        handle.send(&setup.encode())?;
        ctx.attach_engine(handle, events);
        tracing::info!(
            room_id = %ctx.room.id(),
            first_team,
            score = ?ctx.room.match_score(),
            "duel started"
        );
        Ok(())
    }
}

fn duel_setup(room: &Room, first_team: u8) -> DuelSetup {
    let host = room.host_info();
    DuelSetup {
        room_id: room.id(),
        seed: rand::random(),
        start_lp: host.start_lp,
        start_hand: host.start_hand,
        draw_count: host.draw_count,
        duel_flag: host.duel_flag,
        first_team,
        team_sizes: [room.config().team1(), room.config().team2()],
        decks: room.decks(),
    }
}

/// `Response`: forward a player's answer to the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseStrategy;

impl CommandStrategy for ResponseStrategy {
    fn commands(&self) -> &'static [ClientCommand] {
        &[ClientCommand::Response]
    }

    fn execute(
        &self,
        ctx: &mut RoomContext<'_>,
        command: &Command,
    ) -> Result<(), StrategyError> {
        let position = ctx.position()?;
        let duel = ctx.room.duel().ok_or(StrategyError::NoDuel)?;
        duel.send_response(position, &command.body())?;
        Ok(())
    }
}

/// `Surrender`: the other team wins the current duel.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurrenderStrategy;

impl CommandStrategy for SurrenderStrategy {
    fn commands(&self) -> &'static [ClientCommand] {
        &[ClientCommand::Surrender]
    }

    fn execute(
        &self,
        ctx: &mut RoomContext<'_>,
        _command: &Command,
    ) -> Result<(), StrategyError> {
        let position = ctx.position()?;
        let state = ctx.room.state();
        if state != DuelState::Dueling {
            return Err(StrategyError::WrongState(state));
        }
        let winner = 1 - ctx.room.team_of(position);
        tracing::info!(room_id = %ctx.room.id(), position, "player surrendered");
        finish_duel(ctx, winner)
    }
}

/// Every engine frame: relay it to the clients as `GameMsg`; a win
/// message also ends the duel.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineRelayStrategy;

impl CommandStrategy for EngineRelayStrategy {
    fn commands(&self) -> &'static [ClientCommand] {
        &[]
    }

    fn execute(
        &self,
        ctx: &mut RoomContext<'_>,
        command: &Command,
    ) -> Result<(), StrategyError> {
        if ctx.room.state() != DuelState::Dueling {
            tracing::debug!(
                room_id = %ctx.room.id(),
                code = command.code,
                "engine frame outside a duel, dropped"
            );
            return Ok(());
        }

        ctx.room
            .broadcast(&ServerMessage::GameMsg(command.payload.clone()));

        if command.code == engine::MSG_WIN {
            let mut body = command.body();
            let team = if body.has_remaining() { body.get_u8() } else { 2 };
            let reason = if body.has_remaining() { body.get_u8() } else { 0 };
            tracing::info!(room_id = %ctx.room.id(), team, reason, "engine reported a winner");
            finish_duel(ctx, team)?;
        }
        Ok(())
    }
}

/// Ends the current duel with `winner` (0 or 1; anything else is a draw).
///
/// Stops the engine and scores the duel. If that decides the match, the
/// clients get `DuelEnd`, a `GameOver` event goes out, and the room is
/// marked finished. Otherwise the room goes to side decking and the
/// losing team will pick the next turn order.
pub fn finish_duel(ctx: &mut RoomContext<'_>, winner: u8) -> Result<(), StrategyError> {
    let room_id = ctx.room.id();
    drop(ctx.room.take_duel());

    if winner <= 1 {
        ctx.room.duel_winner(winner)?;
    } else {
        tracing::info!(%room_id, "duel drawn");
    }
    let score = ctx.room.match_score();
    tracing::info!(%room_id, winner, team0 = score.team0, team1 = score.team1, "duel finished");

    if winner <= 1 && ctx.room.is_match_finished() {
        let match_winner = ctx.room.match_winner().unwrap_or(winner);
        end_match(ctx, match_winner);
        return Ok(());
    }

    ctx.room.side_decking();
    ctx.room.broadcast(&ServerMessage::ChangeSide);
    if winner <= 1 {
        let loser = 1 - winner;
        let chooser = ctx
            .room
            .clients()
            .iter()
            .filter(|c| ctx.room.team_of(c.position()) == loser)
            .min_by_key(|c| c.position())
            .map(|c| c.conn_id());
        if let Some(conn_id) = chooser {
            ctx.room.set_client_who_chooses_turn(conn_id);
        }
    }
    Ok(())
}

/// Announces the end of the match, publishes `GameOver`, and marks the
/// room finished.
pub(crate) fn end_match(ctx: &mut RoomContext<'_>, winner_team: u8) {
    ctx.room.broadcast(&ServerMessage::DuelEnd);
    let event = DomainEvent::GameOver(game_over(ctx.room, winner_team));
    let report = ctx.events().publish(&event);
    ctx.finish();
    tracing::info!(
        room_id = %ctx.room.id(),
        winner_team,
        subscribers = report.delivered,
        "match finished"
    );
}

/// Called when a seat resubmits its deck between duels. Once every seat
/// has, the turn chooser gets asked.
pub(crate) fn side_deck_submitted(ctx: &mut RoomContext<'_>) -> Result<(), StrategyError> {
    if ctx.room.state() != DuelState::SideDecking || !ctx.room.all_clients_ready() {
        return Ok(());
    }
    let chooser = match ctx.room.client_who_chooses_turn() {
        Some(c) => c.conn_id(),
        None => {
            let first = ctx.room.clients().first().map(|c| c.conn_id());
            let conn_id = first.ok_or(StrategyError::NotAllowed("room is empty"))?;
            ctx.room.set_client_who_chooses_turn(conn_id);
            conn_id
        }
    };
    ctx.room.send_to(chooser, &ServerMessage::ChooseOrder);
    Ok(())
}

/// The engine's output closed. If a duel was still running, it can't
/// finish, so the match ends without a result.
pub fn engine_exited(ctx: &mut RoomContext<'_>) {
    if ctx.room.take_duel().is_none() {
        return;
    }
    if ctx.room.state() == DuelState::Dueling {
        tracing::warn!(room_id = %ctx.room.id(), "duel engine exited mid-duel");
        ctx.room.broadcast(&ServerMessage::DuelEnd);
        ctx.finish();
    }
}

fn game_over(room: &Room, winner_team: u8) -> GameOverData {
    let score = room.match_score();
    let players = room
        .users()
        .iter()
        .map(|user| {
            let team = room.team_of(user.position);
            let won = team == winner_team;
            PlayerResult {
                name: user.name.clone(),
                team,
                outcome: if won { MatchOutcome::Win } else { MatchOutcome::Lose },
                points: u32::from(won),
            }
        })
        .collect();
    GameOverData {
        room_id: room.id(),
        winner_team,
        score: [score.team0, score.team1],
        best_of: room.config().best_of(),
        players,
    }
}
