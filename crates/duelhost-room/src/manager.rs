//! Room manager: allocates ids, creates rooms, finds them for joins, and
//! lists them for the lobby.

use std::collections::HashMap;
use std::sync::Arc;

use duelhost_events::EventBus;
use duelhost_protocol::{CreateGameRequest, RoomId};
use duelhost_session::Client;

use crate::actor::{RoomServices, spawn_room};
use crate::engine::EngineLauncher;
use crate::strategy::CommandRouter;
use crate::{Room, RoomError, RoomHandle, RoomPresentation};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Tracks every running room.
///
/// The server keeps this behind a mutex. Only [`list_rooms`](Self::list_rooms)
/// and [`prune`](Self::prune) await rooms; the server takes
/// [`handles`](Self::handles) instead and talks to rooms unlocked.
pub struct RoomManager {
    rooms: HashMap<RoomId, RoomHandle>,
    next_id: u32,
    services: RoomServices,
    channel_size: usize,
}

impl RoomManager {
    /// Creates a manager whose rooms use the default strategies.
    pub fn new(launcher: Arc<dyn EngineLauncher>, events: Arc<EventBus>) -> Self {
        Self::with_router(CommandRouter::with_default_strategies(), launcher, events)
    }

    /// Creates a manager whose rooms dispatch through `router`.
    pub fn with_router(
        router: CommandRouter,
        launcher: Arc<dyn EngineLauncher>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            next_id: 1,
            services: RoomServices {
                router: Arc::new(router),
                launcher,
                events,
            },
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }

    /// Creates a room from `req` with `creator` in seat 0, starts its
    /// actor, and returns the handle.
    ///
    /// The creator's client is sent the room's welcome messages before the
    /// actor starts.
    ///
    /// # Errors
    /// Returns [`RoomError::InvalidConfig`] for an impossible request.
    pub fn create_room(
        &mut self,
        req: &CreateGameRequest,
        creator: Client,
    ) -> Result<RoomHandle, RoomError> {
        let room_id = self.allocate_id();
        let room = Room::create_from_request(req, creator.name(), room_id)?;
        let handle = spawn_room(room, creator, self.services.clone(), self.channel_size);
        self.rooms.insert(room_id, handle.clone());
        tracing::info!(%room_id, rooms = self.rooms.len(), "room created");
        Ok(handle)
    }

    /// The handle of a live room.
    ///
    /// # Errors
    /// Returns [`RoomError::NotFound`] if the id is unknown or its actor
    /// has stopped.
    pub fn get(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(&room_id)
            .filter(|h| !h.is_closed())
            .cloned()
            .ok_or(RoomError::NotFound(room_id))
    }

    /// Lobby views of every live room still waiting for players.
    pub async fn list_rooms(&self) -> Vec<RoomPresentation> {
        let handles: Vec<RoomHandle> = self.rooms.values().cloned().collect();
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(p) = handle.presentation().await {
                if p.istart == "waiting" {
                    out.push(p);
                }
            }
        }
        out.sort_by_key(|p| p.roomid);
        out
    }

    /// Handles of every room still running.
    ///
    /// Take these under the server's lock, then talk to the rooms with
    /// the lock released.
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.values().filter(|h| !h.is_closed()).cloned().collect()
    }

    /// Drops `closed` and every room whose actor has stopped. Returns how
    /// many rooms were removed.
    pub fn forget(&mut self, closed: &[RoomId]) -> usize {
        let before = self.rooms.len();
        for room_id in closed {
            self.rooms.remove(room_id);
        }
        self.rooms.retain(|_, h| !h.is_closed());

        let removed = before - self.rooms.len();
        if removed > 0 {
            tracing::debug!(removed, rooms = self.rooms.len(), "rooms pruned");
        }
        removed
    }

    /// Stops the empty rooms among `handles` and forgets every stopped
    /// room. Returns how many rooms were removed.
    ///
    /// Holds `&mut self` across room round trips. With a shared manager,
    /// use [`handles`](Self::handles), [`close_empty_rooms`] and
    /// [`forget`](Self::forget) instead.
    pub async fn prune(&mut self) -> usize {
        let closed = close_empty_rooms(&self.handles()).await;
        self.forget(&closed)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn allocate_id(&mut self) -> RoomId {
        let id = RoomId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }
}

/// Stops every room in `handles` that nobody is sitting in and returns
/// their ids.
pub async fn close_empty_rooms(handles: &[RoomHandle]) -> Vec<RoomId> {
    let mut closed = Vec::new();
    for handle in handles {
        let Ok(presentation) = handle.presentation().await else {
            continue;
        };
        if presentation.users.is_empty() {
            let _ = handle.shutdown().await;
            tracing::info!(room_id = %handle.room_id(), "empty room closed");
            closed.push(handle.room_id());
        }
    }
    closed
}

impl std::fmt::Debug for RoomManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomManager")
            .field("rooms", &self.rooms.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
