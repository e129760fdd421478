//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task. Connections and the duel engine talk
//! to it only through messages, so every mutation of a room happens on
//! that one task, one command at a time.
//!
//! ```text
//!  connection tasks ──RoomCommand──┐
//!                                  ├──→ RoomActor ──→ Room + CommandRouter
//!  duel engine ─────EngineEvent────┘
//! ```

use std::sync::Arc;

use bytes::Bytes;
use duelhost_events::EventBus;
use duelhost_protocol::{RoomId, ServerMessage, player_change};
use duelhost_session::{Client, ClientSender};
use duelhost_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::config::clean_name;
use crate::engine::{EngineEvent, EngineLauncher, EngineReceiver};
use crate::strategy::{
    CommandRouter, DispatchOutcome, RoomContext, Source, engine_exited, leave_room,
};
use crate::{Room, RoomError, RoomPresentation};

/// A player asking for a seat.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub conn_id: ConnectionId,
    pub name: String,
    pub password: String,
    pub outbound: ClientSender,
}

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in each variant is the reply channel. For
/// `Dispatch` it doubles as the signal that the frame's strategy has run
/// to completion, broadcasts included.
pub(crate) enum RoomCommand {
    Join {
        request: JoinRequest,
        reply: oneshot::Sender<Result<u8, RoomError>>,
    },
    Dispatch {
        conn_id: ConnectionId,
        payload: Bytes,
        reply: oneshot::Sender<DispatchOutcome>,
    },
    Leave {
        conn_id: ConnectionId,
        reply: oneshot::Sender<()>,
    },
    GetPresentation {
        reply: oneshot::Sender<RoomPresentation>,
    },
    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone: it's an `mpsc::Sender` and the room id.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Asks for a seat. Returns the seat position.
    ///
    /// # Errors
    /// - [`RoomError::WrongPassword`] if the password doesn't match
    /// - [`RoomError::RoomFull`] if no seat is free or the duel has begun
    /// - [`RoomError::NameUnavailable`] if the name is empty or already seated
    /// - [`RoomError::Unavailable`] if the room has stopped
    pub async fn join(&self, request: JoinRequest) -> Result<u8, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Join { request, reply }).await?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Runs one client frame through the room's router and waits until
    /// its strategy has finished.
    pub async fn dispatch(
        &self,
        conn_id: ConnectionId,
        payload: Bytes,
    ) -> Result<DispatchOutcome, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Dispatch {
            conn_id,
            payload,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Removes a connection from the room. Safe to call for connections
    /// that already left.
    pub async fn leave(&self, conn_id: ConnectionId) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Leave { conn_id, reply }).await?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// The room's lobby view.
    pub async fn presentation(&self) -> Result<RoomPresentation, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::GetPresentation { reply }).await?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Tells the room to stop.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// Shared collaborators every room actor uses.
#[derive(Clone)]
pub struct RoomServices {
    pub router: Arc<CommandRouter>,
    pub launcher: Arc<dyn EngineLauncher>,
    pub events: Arc<EventBus>,
}

struct RoomActor {
    room: Room,
    services: RoomServices,
    receiver: mpsc::Receiver<RoomCommand>,
    engine_events: Option<EngineReceiver>,
    finished: bool,
}

impl RoomActor {
    async fn run(mut self) {
        let room_id = self.room.id();
        tracing::info!(%room_id, "room actor started");

        while !self.finished {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(RoomCommand::Shutdown) | None => {
                        tracing::info!(%room_id, "room shutting down");
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                },
                event = next_engine_event(&mut self.engine_events) => match event {
                    Some(event) => self.handle_engine(event),
                    None => self.engine_events = None,
                },
            }
        }

        tracing::info!(%room_id, "room actor stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { request, reply } => {
                let _ = reply.send(self.handle_join(request));
            }
            RoomCommand::Dispatch {
                conn_id,
                payload,
                reply,
            } => {
                let outcome = self.run_strategy(Source::Client(conn_id), |router, ctx| {
                    router.dispatch(ctx, payload)
                });
                let _ = reply.send(outcome);
            }
            RoomCommand::Leave { conn_id, reply } => {
                self.run_strategy(Source::Client(conn_id), |_, ctx| {
                    if let Err(e) = leave_room(ctx, conn_id) {
                        tracing::warn!(room_id = %ctx.room.id(), %conn_id, error = %e, "leave failed");
                    }
                });
                let _ = reply.send(());
            }
            RoomCommand::GetPresentation { reply } => {
                let _ = reply.send(self.room.to_presentation());
            }
            RoomCommand::Shutdown => {}
        }
    }

    fn handle_engine(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Frame(payload) => {
                self.run_strategy(Source::Engine, |router, ctx| {
                    router.dispatch(ctx, payload);
                });
            }
            EngineEvent::Exited => {
                self.run_strategy(Source::Engine, |_, ctx| engine_exited(ctx));
            }
        }
    }

    /// Builds a context, runs `f`, and applies what the strategy asked of
    /// the actor (a new engine stream, or stopping).
    fn run_strategy<T>(
        &mut self,
        source: Source,
        f: impl FnOnce(&CommandRouter, &mut RoomContext<'_>) -> T,
    ) -> T {
        let services = &self.services;
        let mut ctx = RoomContext::new(
            &mut self.room,
            source,
            &services.events,
            services.launcher.as_ref(),
        );
        let out = f(&services.router, &mut ctx);
        let engine_events = ctx.take_engine_events();
        let finished = ctx.is_finished();

        if engine_events.is_some() {
            self.engine_events = engine_events;
        }
        if finished {
            self.finished = true;
        }
        out
    }

    fn handle_join(&mut self, request: JoinRequest) -> Result<u8, RoomError> {
        let room_id = self.room.id();
        if !self.room.config().password_matches(&request.password) {
            return Err(RoomError::WrongPassword(room_id));
        }
        if !self.room.state().is_joinable() {
            return Err(RoomError::RoomFull(room_id));
        }
        if clean_name(&request.name).is_empty() || self.room.is_name_seated(&request.name) {
            return Err(RoomError::NameUnavailable(room_id));
        }
        let position = self.room.free_position().ok_or(RoomError::RoomFull(room_id))?;

        self.room.seat_user(position, &request.name);
        let client = Client::new(request.conn_id, &request.name, position, request.outbound);
        welcome(&self.room, &client);
        self.room.broadcast(&ServerMessage::PlayerEnter {
            name: client.name().to_string(),
            position,
        });
        self.room.add_client(client);

        tracing::info!(
            %room_id,
            conn_id = %request.conn_id,
            position,
            players = self.room.clients().len(),
            "player joined"
        );
        Ok(position)
    }
}

/// Tells a newly seated client about the room: rules, its own seat, who
/// is already sitting where, and who is already ready.
fn welcome(room: &Room, client: &Client) {
    let mut msgs = vec![
        ServerMessage::JoinGame(room.host_info().clone()),
        ServerMessage::TypeChange(type_change(client.position())),
    ];
    msgs.extend(room.users().iter().map(|u| ServerMessage::PlayerEnter {
        name: u.name.clone(),
        position: u.position,
    }));
    msgs.extend(
        room.clients()
            .iter()
            .filter(|c| c.is_ready())
            .map(|c| ServerMessage::PlayerChange {
                status: player_change::ready(c.position()),
            }),
    );

    for msg in &msgs {
        if let Err(e) = client.send(msg) {
            tracing::debug!(room_id = %room.id(), error = %e, "welcome message dropped");
            return;
        }
    }
}

/// `TypeChange` value for a seat: the seat, with bit 4 set for the host.
fn type_change(position: u8) -> u8 {
    if position == 0 { 0x10 } else { position }
}

async fn next_engine_event(rx: &mut Option<EngineReceiver>) -> Option<EngineEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Spawns the actor for `room`, with `creator` as its first client, and
/// returns its handle.
pub(crate) fn spawn_room(
    mut room: Room,
    creator: Client,
    services: RoomServices,
    channel_size: usize,
) -> RoomHandle {
    let room_id = room.id();
    welcome(&room, &creator);
    room.add_client(creator);

    let (tx, rx) = mpsc::channel(channel_size);
    let actor = RoomActor {
        room,
        services,
        receiver: rx,
        engine_events: None,
        finished: false,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_change_marks_host() {
        assert_eq!(type_change(0), 0x10);
        assert_eq!(type_change(1), 1);
        assert_eq!(type_change(3), 3);
    }
}
