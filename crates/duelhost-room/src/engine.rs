//! The duel engine boundary.
//!
//! The rules engine runs as a child process. The room writes framed
//! messages to its stdin and gets framed messages back from its stdout,
//! using the same u16 length prefix as the client protocol. Output frames
//! come back to the room actor as [`EngineEvent`]s, so engine traffic
//! goes through the same queue as player commands and never blocks one.

use std::path::PathBuf;
use std::process::Stdio;

use bytes::{BufMut, Bytes, BytesMut};
use duelhost_protocol::{
    Deck, FrameDecoder, MAX_WIRE_FRAME_LEN, RoomId, encode_frame, engine,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};

use crate::EngineError;

/// Something the engine did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// One frame payload from the engine's stdout.
    Frame(Bytes),
    /// The engine's stdout closed; the process is gone.
    Exited,
}

/// Receiving end of an engine's events. Owned by the room actor.
pub type EngineReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// The room's handle on a running duel engine.
///
/// Dropping it closes the engine's input and stops the process.
#[derive(Debug)]
pub struct DuelHandle {
    input: mpsc::UnboundedSender<Bytes>,
    _kill: Option<oneshot::Sender<()>>,
}

impl DuelHandle {
    /// Wraps a channel whose receiver writes to the engine.
    pub fn new(input: mpsc::UnboundedSender<Bytes>) -> Self {
        Self { input, _kill: None }
    }

    /// Frames `payload` and queues it for the engine's stdin.
    pub fn send(&self, payload: &[u8]) -> Result<(), EngineError> {
        let frame = encode_frame(payload)?;
        self.input.send(frame).map_err(|_| EngineError::Closed)
    }

    /// Forwards a player's response to an engine prompt.
    pub fn send_response(
        &self,
        position: u8,
        body: &[u8],
    ) -> Result<(), EngineError> {
        let mut payload = BytesMut::with_capacity(2 + body.len());
        payload.put_u8(engine::RESPONSE);
        payload.put_u8(position);
        payload.put_slice(body);
        self.send(&payload)
    }
}

/// Everything the engine needs to start a duel.
#[derive(Debug, Clone)]
pub struct DuelSetup {
    pub room_id: RoomId,
    pub seed: u32,
    pub start_lp: u32,
    pub start_hand: u8,
    pub draw_count: u8,
    pub duel_flag: u32,
    /// Team that takes the first turn.
    pub first_team: u8,
    /// Seats on team 0 and team 1.
    pub team_sizes: [u8; 2],
    /// Decks in seat order.
    pub decks: Vec<Deck>,
}

impl DuelSetup {
    /// The `START` payload:
    /// `code, seed u32, lp u32, hand u8, draw u8, flag u32, first u8,
    /// team sizes u8 u8, deck count u8, decks...`.
    pub fn encode(&self) -> Bytes {
        let decks_len: usize = self.decks.iter().map(Deck::encoded_len).sum();
        let mut buf = BytesMut::with_capacity(19 + decks_len);
        buf.put_u8(engine::START);
        buf.put_u32_le(self.seed);
        buf.put_u32_le(self.start_lp);
        buf.put_u8(self.start_hand);
        buf.put_u8(self.draw_count);
        buf.put_u32_le(self.duel_flag);
        buf.put_u8(self.first_team);
        buf.put_u8(self.team_sizes[0]);
        buf.put_u8(self.team_sizes[1]);
        buf.put_u8(self.decks.len() as u8);
        for deck in &self.decks {
            deck.encode(&mut buf);
        }
        buf.freeze()
    }
}

/// Starts duel engines.
///
/// The room calls `launch` from inside its actor, so it must not block:
/// start the engine, hand back the handle and event stream, and do all
/// I/O on spawned tasks. The room sends the `START` frame itself through
/// the returned handle.
pub trait EngineLauncher: Send + Sync + 'static {
    fn launch(
        &self,
        setup: &DuelSetup,
    ) -> Result<(DuelHandle, EngineReceiver), EngineError>;
}

/// Runs the engine as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    max_frame_len: usize,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            max_frame_len: MAX_WIRE_FRAME_LEN,
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    /// Bound on an engine frame's payload.
    pub fn max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }
}

impl EngineLauncher for ProcessLauncher {
    fn launch(
        &self,
        setup: &DuelSetup,
    ) -> Result<(DuelHandle, EngineReceiver), EngineError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stdin = child.stdin.take().ok_or(EngineError::MissingPipe("stdin"))?;
        let stdout =
            child.stdout.take().ok_or(EngineError::MissingPipe("stdout"))?;

        let room_id = setup.room_id;
        tracing::info!(
            %room_id,
            program = %self.program.display(),
            pid = child.id(),
            "duel engine spawned"
        );

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();

        tokio::spawn(write_frames(room_id, stdin, input_rx));
        tokio::spawn(read_frames(
            room_id,
            child,
            stdout,
            FrameDecoder::with_max_len(self.max_frame_len),
            event_tx,
            kill_rx,
        ));

        let handle = DuelHandle {
            input: input_tx,
            _kill: Some(kill_tx),
        };
        Ok((handle, event_rx))
    }
}

async fn write_frames(
    room_id: RoomId,
    mut stdin: ChildStdin,
    mut input: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(frame) = input.recv().await {
        if let Err(e) = stdin.write_all(&frame).await {
            tracing::warn!(%room_id, error = %e, "write to duel engine failed");
            break;
        }
    }
    // Dropping stdin closes the pipe; the engine sees EOF.
}

async fn read_frames(
    room_id: RoomId,
    mut child: Child,
    mut stdout: ChildStdout,
    mut decoder: FrameDecoder,
    events: mpsc::UnboundedSender<EngineEvent>,
    mut kill: oneshot::Receiver<()>,
) {
    let mut chunk = vec![0u8; 4096];
    loop {
        tokio::select! {
            read = stdout.read(&mut chunk) => {
                let n = match read {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!(%room_id, error = %e, "read from duel engine failed");
                        break;
                    }
                };
                if let Err(e) = decoder.feed(&chunk[..n]) {
                    tracing::error!(%room_id, error = %e, "duel engine sent a bad frame");
                    break;
                }
                while decoder.is_message_ready() {
                    match decoder.take_message() {
                        Ok(frame) => {
                            let _ = events.send(EngineEvent::Frame(frame));
                        }
                        Err(e) => {
                            tracing::error!(%room_id, error = %e, "duel engine sent a bad frame");
                            break;
                        }
                    }
                }
                if let Err(e) = decoder.check_header() {
                    tracing::error!(%room_id, error = %e, "duel engine sent a bad frame");
                    break;
                }
            }
            _ = &mut kill => {
                tracing::debug!(%room_id, "duel engine released by room");
                break;
            }
        }
    }

    if let Err(e) = child.start_kill() {
        tracing::debug!(%room_id, error = %e, "duel engine already gone");
    }
    match child.wait().await {
        Ok(status) => tracing::info!(%room_id, %status, "duel engine exited"),
        Err(e) => tracing::warn!(%room_id, error = %e, "failed to reap duel engine"),
    }
    let _ = events.send(EngineEvent::Exited);
}
