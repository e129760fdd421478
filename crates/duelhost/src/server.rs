//! `DuelhostServer` builder and accept loop.
//!
//! This is the entry point for running a duel server. It ties together
//! all the layers: transport → frame decoder → session → room.

use std::net::SocketAddr;
use std::sync::Arc;

use duelhost_events::{EventBus, EventKind};
use duelhost_protocol::DEFAULT_MAX_FRAME_LEN;
use duelhost_room::{EngineLauncher, RoomManager};
use duelhost_session::SessionManager;
use duelhost_transport::{Transport, TcpTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{DuelhostError, EngineConfig, MatchRepository, RecordMatch, ServerConfig};

/// Shared server state passed to each connection task.
///
/// Neither lock is held across an await on a room.
pub(crate) struct ServerState {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) max_frame_len: usize,
}

/// Builder for configuring and starting a duel server.
///
/// # Example
///
/// ```rust,ignore
/// use duelhost::prelude::*;
///
/// let server = DuelhostServer::builder()
///     .bind("0.0.0.0:7911")
///     .launcher(ProcessLauncher::new("/usr/local/bin/duel-engine"))
///     .repository(InMemoryMatchRepository::new())
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct DuelhostServerBuilder {
    bind_addr: String,
    max_frame_len: usize,
    launcher: Arc<dyn EngineLauncher>,
    events: Arc<EventBus>,
}

impl DuelhostServerBuilder {
    /// Creates a builder with default settings and the default engine
    /// program.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:7911".to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            launcher: Arc::new(EngineConfig::default().launcher()),
            events: Arc::new(EventBus::new()),
        }
    }

    /// A builder set up from a loaded config. The repository is not part
    /// of it; add one with [`repository`](Self::repository).
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new()
            .bind(&config.bind_addr)
            .max_frame_len(config.max_frame_len)
            .launcher(config.engine.launcher())
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the largest client frame payload accepted.
    pub fn max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Sets how duel engines are started.
    pub fn launcher(mut self, launcher: impl EngineLauncher) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    /// Uses `events` as the server's event bus, keeping any handlers
    /// already subscribed to it.
    pub fn event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Records finished matches in `repository`.
    pub fn repository<R: MatchRepository + Clone>(self, repository: R) -> Self {
        self.events
            .subscribe(EventKind::GameOver, RecordMatch::new(repository));
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<DuelhostServer, DuelhostError> {
        let transport = TcpTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new()),
            rooms: Mutex::new(RoomManager::new(self.launcher, Arc::clone(&self.events))),
            max_frame_len: self.max_frame_len,
        });

        Ok(DuelhostServer {
            transport,
            state,
            events: self.events,
        })
    }
}

impl Default for DuelhostServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound duel server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DuelhostServer {
    transport: TcpTransport,
    state: Arc<ServerState>,
    events: Arc<EventBus>,
}

impl DuelhostServer {
    /// Creates a new builder.
    pub fn builder() -> DuelhostServerBuilder {
        DuelhostServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The server's event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), DuelhostError> {
        tracing::info!(addr = ?self.local_addr().ok(), "duelhost server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
