//! Per-connection handler: framing, lobby commands, and room routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Open a session and start the writer task for outbound frames
//!   2. Loop: read a chunk → feed the decoder → drain every complete frame
//!   3. Lobby commands (name, create, join) run here; everything else goes
//!      to the connection's room, one frame at a time
//!   4. On close or error: forget the session and leave the room

use std::sync::Arc;

use bytes::Bytes;
use duelhost_protocol::{
    ClientCommand, CreateGameRequest, FrameDecoder, JoinGameRequest, PlayerInfo, RoomId,
    ServerMessage, error_kind, split_command,
};
use duelhost_room::{DispatchOutcome, JoinRequest, RoomError, RoomHandle, close_empty_rooms};
use duelhost_session::{Client, ClientSender, outbound_channel};
use duelhost_transport::{Connection, ConnectionId, TcpConnection};
use tokio::sync::mpsc;

use crate::DuelhostError;
use crate::server::ServerState;

/// What one connection knows about itself between frames.
struct Link {
    conn_id: ConnectionId,
    outbound: ClientSender,
    name: String,
    /// Cached so room frames don't take the manager lock.
    room: Option<RoomHandle>,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    state: Arc<ServerState>,
) -> Result<(), DuelhostError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    state
        .sessions
        .lock()
        .await
        .open(conn_id, conn.remote_addr())?;
    tracing::info!(%conn_id, addr = %conn.remote_addr(), "client connected");

    let (outbound, rx) = outbound_channel();
    let writer = tokio::spawn(write_frames(Arc::clone(&conn), rx));
    let mut link = Link {
        conn_id,
        outbound,
        name: String::new(),
        room: None,
    };

    let result = read_frames(&conn, &state, &mut link).await;
    if let Err(e) = &result {
        tracing::info!(%conn_id, error = %e, "closing connection");
    }

    disconnect(&state, conn_id).await;
    drop(link);
    writer.abort();
    let _ = conn.close().await;
    result
}

/// Reads until the peer closes, a read fails, or the framing breaks.
async fn read_frames(
    conn: &TcpConnection,
    state: &ServerState,
    link: &mut Link,
) -> Result<(), DuelhostError> {
    let mut decoder = FrameDecoder::with_max_len(state.max_frame_len);
    loop {
        let Some(chunk) = conn.recv().await? else {
            tracing::info!(conn_id = %link.conn_id, "connection closed by peer");
            return Ok(());
        };

        decoder.feed(&chunk)?;
        while decoder.is_message_ready() {
            let payload = decoder.take_message()?;
            handle_frame(state, link, payload).await;
        }
        decoder.check_header()?;
    }
}

/// Drains the connection's outbound queue onto the socket.
///
/// Room broadcasts land in the queue from the room's task; this is the
/// only place that writes to the socket, so frames go out in the order
/// they were queued.
async fn write_frames(conn: Arc<TcpConnection>, mut rx: mpsc::UnboundedReceiver<Bytes>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "write failed");
            break;
        }
    }
}

/// Runs one frame. Nothing here closes the connection: a bad command
/// body is logged and the next frame is read as usual.
async fn handle_frame(state: &ServerState, link: &mut Link, payload: Bytes) {
    let Some((code, mut body)) = split_command(&payload) else {
        return;
    };

    let result = match ClientCommand::from_code(code) {
        Some(ClientCommand::PlayerInfo) => player_info(state, link, &mut body).await,
        Some(ClientCommand::CreateGame) => create_game(state, link, &mut body).await,
        Some(ClientCommand::JoinGame) => join_game(state, link, &mut body).await,
        _ => {
            forward(state, link, code, payload).await;
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::warn!(conn_id = %link.conn_id, code, error = %e, "lobby command failed");
    }
}

async fn player_info(
    state: &ServerState,
    link: &mut Link,
    body: &mut Bytes,
) -> Result<(), DuelhostError> {
    let info = PlayerInfo::decode(body)?;
    state
        .sessions
        .lock()
        .await
        .set_name(link.conn_id, info.name.clone())?;
    tracing::debug!(conn_id = %link.conn_id, name = %info.name, "player named");
    link.name = info.name;
    Ok(())
}

async fn create_game(
    state: &ServerState,
    link: &mut Link,
    body: &mut Bytes,
) -> Result<(), DuelhostError> {
    if link.room.is_some() {
        tracing::debug!(conn_id = %link.conn_id, "create while seated, ignoring");
        return Ok(());
    }
    let req = CreateGameRequest::decode(body)?;
    let creator = Client::new(link.conn_id, &link.name, 0, link.outbound.clone());

    let created = state.rooms.lock().await.create_room(&req, creator);
    match created {
        Ok(handle) => {
            enter(state, link, handle).await?;
            Ok(())
        }
        Err(e) => {
            send_join_error(link, &e)?;
            Err(e.into())
        }
    }
}

async fn join_game(
    state: &ServerState,
    link: &mut Link,
    body: &mut Bytes,
) -> Result<(), DuelhostError> {
    if link.room.is_some() {
        tracing::debug!(conn_id = %link.conn_id, "join while seated, ignoring");
        return Ok(());
    }
    let req = JoinGameRequest::decode(body)?;
    let room_id = RoomId(req.room_id);

    let found = state.rooms.lock().await.get(room_id);
    let joined = match found {
        Ok(handle) => {
            let seated = handle
                .join(JoinRequest {
                    conn_id: link.conn_id,
                    name: link.name.clone(),
                    password: req.password,
                    outbound: link.outbound.clone(),
                })
                .await;
            seated.map(|_| handle)
        }
        Err(e) => Err(e),
    };

    match joined {
        Ok(handle) => enter(state, link, handle).await,
        Err(e) => {
            tracing::info!(conn_id = %link.conn_id, %room_id, error = %e, "join refused");
            send_join_error(link, &e)
        }
    }
}

/// Records that the connection now sits in `handle`'s room.
async fn enter(
    state: &ServerState,
    link: &mut Link,
    handle: RoomHandle,
) -> Result<(), DuelhostError> {
    state
        .sessions
        .lock()
        .await
        .enter_room(link.conn_id, handle.room_id())?;
    link.room = Some(handle);
    Ok(())
}

/// Hands a room command to the connection's room and waits until the
/// room has finished with it.
async fn forward(state: &ServerState, link: &mut Link, code: u8, payload: Bytes) {
    let Some(handle) = link.room.clone() else {
        tracing::debug!(conn_id = %link.conn_id, code, "room command outside a room, ignoring");
        return;
    };

    let outcome = handle.dispatch(link.conn_id, payload).await;
    match outcome {
        Ok(DispatchOutcome::Handled) if code == ClientCommand::LeaveGame.code() => {
            back_to_lobby(state, link).await;
        }
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(conn_id = %link.conn_id, error = %e, "room gone");
            back_to_lobby(state, link).await;
        }
    }
}

async fn back_to_lobby(state: &ServerState, link: &mut Link) {
    link.room = None;
    if let Err(e) = state.sessions.lock().await.leave_room(link.conn_id) {
        tracing::debug!(conn_id = %link.conn_id, error = %e, "no session to return to lobby");
    }
}

fn send_join_error(link: &Link, err: &RoomError) -> Result<(), DuelhostError> {
    let frame = ServerMessage::ErrorMsg {
        kind: error_kind::JOIN_ERROR,
        code: err.join_error_code(),
    }
    .encode()?;
    // A closed queue means the writer is gone and the read loop is about
    // to see the close too.
    let _ = link.outbound.send(frame);
    Ok(())
}

/// Forgets the connection and takes it out of its last known room.
///
/// Safe to run more than once for the same connection: only the first
/// call finds a session and a room.
async fn disconnect(state: &ServerState, conn_id: ConnectionId) {
    let last_room = state.sessions.lock().await.close(conn_id);
    let Some(room_id) = last_room else {
        return;
    };

    let found = state.rooms.lock().await.get(room_id);
    if let Ok(handle) = found {
        if let Err(e) = handle.leave(conn_id).await {
            tracing::debug!(%conn_id, %room_id, error = %e, "room gone before leave");
        }
    }
    let pruned = prune_rooms(state).await;
    tracing::info!(%conn_id, %room_id, pruned, "client disconnected");
}

/// Closes empty rooms and forgets stopped ones. The manager lock is only
/// held to copy the handles out and to drop ids, never while a room is
/// asked anything.
async fn prune_rooms(state: &ServerState) -> usize {
    let handles = state.rooms.lock().await.handles();
    let closed = close_empty_rooms(&handles).await;
    state.rooms.lock().await.forget(&closed)
}
