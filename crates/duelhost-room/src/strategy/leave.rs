//! Leaving a room, by command or by disconnect.

use duelhost_protocol::{ClientCommand, ServerMessage, player_change};
use duelhost_session::Client;
use duelhost_transport::ConnectionId;

use super::duel::end_match;
use super::{Command, CommandStrategy, RoomContext};
use crate::StrategyError;

/// `LeaveGame`: the client walks out of the room.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeaveStrategy;

impl CommandStrategy for LeaveStrategy {
    fn commands(&self) -> &'static [ClientCommand] {
        &[ClientCommand::LeaveGame]
    }

    fn execute(
        &self,
        ctx: &mut RoomContext<'_>,
        _command: &Command,
    ) -> Result<(), StrategyError> {
        let conn_id = ctx.conn_id()?;
        leave_room(ctx, conn_id)
    }
}

/// Removes `conn_id` from the room and tells the others its seat is free.
///
/// Leaving while a match is undecided forfeits it: the other team is
/// awarded duels until the match is won, and `GameOver` goes out with
/// the leaver still listed. A connection that isn't in the room is
/// ignored, so a close after an explicit leave does nothing.
pub fn leave_room(ctx: &mut RoomContext<'_>, conn_id: ConnectionId) -> Result<(), StrategyError> {
    let Some(position) = ctx.room.client(conn_id).map(Client::position) else {
        return Ok(());
    };

    if ctx.room.has_match() && !ctx.room.is_match_finished() {
        let winner = 1 - ctx.room.team_of(position);
        drop(ctx.room.take_duel());
        while !ctx.room.is_match_finished() {
            ctx.room.duel_winner(winner)?;
        }
        tracing::info!(room_id = %ctx.room.id(), position, "match forfeited by leaving player");
        end_match(ctx, winner);
    }

    ctx.room.remove_player(conn_id);
    ctx.room.broadcast(&ServerMessage::PlayerChange {
        status: player_change::leave(position),
    });
    Ok(())
}
