//! Command strategies and the router that picks one per frame.
//!
//! A strategy is the state transition for one or more command codes. The
//! router looks up the strategy for a frame's code and runs it against
//! the room with a [`RoomContext`]. Strategies compose the primitives
//! [`Room`] exposes; the room itself never decides when a duel starts or
//! ends.
//!
//! # Ordering
//!
//! The room actor dispatches one frame at a time and only replies to the
//! connection once the strategy has returned, broadcasts included. The
//! connection waits for that reply before sending its next frame, so
//! frames from one client apply strictly in order and no two strategies
//! ever interleave on the same room.

mod chat;
mod duel;
mod leave;
mod ready;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use duelhost_events::EventBus;
use duelhost_protocol::{ClientCommand, split_command};
use duelhost_session::Client;
use duelhost_transport::ConnectionId;

use crate::engine::{DuelHandle, EngineLauncher, EngineReceiver};
use crate::{Room, StrategyError};

pub use chat::ChatStrategy;
pub use duel::{
    EngineRelayStrategy, ResponseStrategy, StartStrategy, SurrenderStrategy,
    TurnChoiceStrategy, engine_exited, finish_duel,
};
pub use leave::{LeaveStrategy, leave_room};
pub use ready::{NotReadyStrategy, ReadyStrategy, UpdateDeckStrategy};

/// Where a frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A player's connection.
    Client(ConnectionId),
    /// The room's duel engine.
    Engine,
}

/// One decoded frame: its code and full payload.
#[derive(Debug, Clone)]
pub struct Command {
    pub code: u8,
    /// The whole payload, code byte included.
    pub payload: Bytes,
}

impl Command {
    /// Splits a frame payload. `None` for an empty payload.
    pub fn from_payload(payload: Bytes) -> Option<Self> {
        let (code, _) = split_command(&payload)?;
        Some(Self { code, payload })
    }

    /// The payload after the code byte.
    pub fn body(&self) -> Bytes {
        self.payload.slice(1..)
    }
}

/// What a strategy can see and touch while it runs.
pub struct RoomContext<'a> {
    pub room: &'a mut Room,
    pub source: Source,
    events: &'a EventBus,
    launcher: &'a dyn EngineLauncher,
    engine_events: Option<EngineReceiver>,
    finished: bool,
}

impl<'a> RoomContext<'a> {
    pub fn new(
        room: &'a mut Room,
        source: Source,
        events: &'a EventBus,
        launcher: &'a dyn EngineLauncher,
    ) -> Self {
        Self {
            room,
            source,
            events,
            launcher,
            engine_events: None,
            finished: false,
        }
    }

    /// The acting connection.
    ///
    /// # Errors
    /// [`StrategyError::NotAllowed`] when the frame came from the engine.
    pub fn conn_id(&self) -> Result<ConnectionId, StrategyError> {
        match self.source {
            Source::Client(id) => Ok(id),
            Source::Engine => Err(StrategyError::NotAllowed("engine frame on a client command")),
        }
    }

    /// The acting client.
    pub fn client(&self) -> Result<&Client, StrategyError> {
        let conn_id = self.conn_id()?;
        self.room
            .client(conn_id)
            .ok_or(StrategyError::NotSeated(conn_id))
    }

    pub fn client_mut(&mut self) -> Result<&mut Client, StrategyError> {
        let conn_id = self.conn_id()?;
        self.room
            .client_mut(conn_id)
            .ok_or(StrategyError::NotSeated(conn_id))
    }

    /// The acting client's seat.
    pub fn position(&self) -> Result<u8, StrategyError> {
        Ok(self.client()?.position())
    }

    pub fn events(&self) -> &EventBus {
        self.events
    }

    pub fn launcher(&self) -> &dyn EngineLauncher {
        self.launcher
    }

    /// Attaches a freshly launched engine to the room. The actor picks up
    /// the event stream once the strategy returns.
    pub fn attach_engine(&mut self, handle: DuelHandle, events: EngineReceiver) {
        self.room.set_duel(handle);
        self.engine_events = Some(events);
    }

    pub fn take_engine_events(&mut self) -> Option<EngineReceiver> {
        self.engine_events.take()
    }

    /// Marks the room as done. The actor stops after this command.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// The state transition for one or more command codes.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The client commands this strategy handles. Engine-side strategies
    /// return an empty list.
    fn commands(&self) -> &'static [ClientCommand];

    fn execute(
        &self,
        ctx: &mut RoomContext<'_>,
        command: &Command,
    ) -> Result<(), StrategyError>;
}

/// What happened to a dispatched frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A strategy ran and succeeded.
    Handled,
    /// No strategy handles this code (or the payload was empty).
    Ignored,
    /// A strategy ran and failed. The error has been logged.
    Failed,
}

/// Maps command codes to strategies.
#[derive(Clone, Default)]
pub struct CommandRouter {
    client: HashMap<u8, Arc<dyn CommandStrategy>>,
    engine: Option<Arc<dyn CommandStrategy>>,
}

impl CommandRouter {
    /// A router with no strategies. Every frame is ignored.
    pub fn new() -> Self {
        Self::default()
    }

    /// A router with every room strategy registered.
    pub fn with_default_strategies() -> Self {
        let mut router = Self::new();
        router.register(ReadyStrategy);
        router.register(NotReadyStrategy);
        router.register(UpdateDeckStrategy);
        router.register(StartStrategy);
        router.register(TurnChoiceStrategy);
        router.register(ResponseStrategy);
        router.register(ChatStrategy);
        router.register(SurrenderStrategy);
        router.register(LeaveStrategy);
        router.set_engine_strategy(EngineRelayStrategy);
        router
    }

    /// Registers `strategy` for every code in its `commands()`, replacing
    /// any earlier registration for those codes.
    pub fn register(&mut self, strategy: impl CommandStrategy) {
        let strategy: Arc<dyn CommandStrategy> = Arc::new(strategy);
        for cmd in strategy.commands() {
            self.client.insert(cmd.code(), Arc::clone(&strategy));
        }
    }

    /// Sets the strategy that handles every frame from the duel engine.
    pub fn set_engine_strategy(&mut self, strategy: impl CommandStrategy) {
        self.engine = Some(Arc::new(strategy));
    }

    /// Runs the strategy for `payload`.
    ///
    /// Unknown codes are ignored. Strategy errors are logged here and go
    /// no further.
    pub fn dispatch(&self, ctx: &mut RoomContext<'_>, payload: Bytes) -> DispatchOutcome {
        let room_id = ctx.room.id();
        let Some(command) = Command::from_payload(payload) else {
            return DispatchOutcome::Ignored;
        };

        let strategy = match ctx.source {
            Source::Client(_) => self.client.get(&command.code),
            Source::Engine => self.engine.as_ref(),
        };
        let Some(strategy) = strategy else {
            tracing::debug!(
                %room_id,
                source = ?ctx.source,
                code = command.code,
                "no strategy for command, ignoring"
            );
            return DispatchOutcome::Ignored;
        };

        match strategy.execute(ctx, &command) {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => {
                tracing::warn!(
                    %room_id,
                    source = ?ctx.source,
                    code = command.code,
                    error = %e,
                    "command failed"
                );
                DispatchOutcome::Failed
            }
        }
    }
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut codes: Vec<_> = self.client.keys().copied().collect();
        codes.sort_unstable();
        f.debug_struct("CommandRouter")
            .field("client_codes", &codes)
            .field("engine", &self.engine.is_some())
            .finish()
    }
}
