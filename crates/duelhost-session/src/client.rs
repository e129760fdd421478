//! A seated participant and its outbound message channel.

use bytes::Bytes;
use duelhost_protocol::ServerMessage;
use duelhost_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::SessionError;

/// Sending half of a client's outbound queue. Each item is a complete,
/// already-framed message.
pub type ClientSender = mpsc::UnboundedSender<Bytes>;

/// Creates the outbound queue for one connection.
///
/// The receiver belongs to the connection's writer task, which writes
/// frames to the socket in the order they were queued. The queue is
/// unbounded so that a broadcast never waits on a slow reader while the
/// room is mid-command.
pub fn outbound_channel() -> (ClientSender, mpsc::UnboundedReceiver<Bytes>) {
    mpsc::unbounded_channel()
}

/// A named participant bound to one connection and one seat.
#[derive(Debug, Clone)]
pub struct Client {
    conn_id: ConnectionId,
    name: String,
    position: u8,
    ready: bool,
    outbound: ClientSender,
}

impl Client {
    pub fn new(
        conn_id: ConnectionId,
        name: impl Into<String>,
        position: u8,
        outbound: ClientSender,
    ) -> Self {
        Self {
            conn_id,
            name: name.into(),
            position,
            ready: false,
            outbound,
        }
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seat index: 0 is the host.
    pub fn position(&self) -> u8 {
        self.position
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Encodes and queues `msg` for this client.
    ///
    /// # Errors
    /// - [`SessionError::Protocol`] if the message can't be framed
    /// - [`SessionError::ChannelClosed`] if the connection's writer is gone
    pub fn send(&self, msg: &ServerMessage) -> Result<(), SessionError> {
        let frame = msg.encode()?;
        self.send_frame(frame)
    }

    /// Queues an already-framed message.
    pub fn send_frame(&self, frame: Bytes) -> Result<(), SessionError> {
        self.outbound
            .send(frame)
            .map_err(|_| SessionError::ChannelClosed(self.conn_id))
    }
}
