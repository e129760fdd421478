//! Room chat.

use duelhost_protocol::{ClientCommand, ServerMessage, decode_chat};

use super::{Command, CommandStrategy, RoomContext};
use crate::StrategyError;

/// `Chat`: relay the line to every client, tagged with the sender's seat.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatStrategy;

impl CommandStrategy for ChatStrategy {
    fn commands(&self) -> &'static [ClientCommand] {
        &[ClientCommand::Chat]
    }

    fn execute(
        &self,
        ctx: &mut RoomContext<'_>,
        command: &Command,
    ) -> Result<(), StrategyError> {
        let position = ctx.position()?;
        let text = decode_chat(&mut command.body());
        if text.trim().is_empty() {
            return Ok(());
        }
        ctx.room.broadcast(&ServerMessage::Chat {
            position: u16::from(position),
            text,
        });
        Ok(())
    }
}
