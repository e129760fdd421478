//! Integration tests for the duelhost server, handler, and full connection flow.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use duelhost::prelude::*;
use duelhost_protocol::{
    ClientCommand, CreateGameRequest, Deck, FrameDecoder, HostInfo, JoinGameRequest,
    PlayerInfo, ServerCommand, client_frame, error_kind, player_change,
};
use duelhost_room::{DuelHandle, DuelSetup, EngineError, EngineEvent, EngineReceiver};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

// =========================================================================
// Engine stand-in: accepts input and never says anything.
// =========================================================================

type EngineEnds = (mpsc::UnboundedReceiver<Bytes>, mpsc::UnboundedSender<EngineEvent>);

#[derive(Clone, Default)]
struct SilentLauncher {
    engines: Arc<Mutex<Vec<EngineEnds>>>,
}

impl EngineLauncher for SilentLauncher {
    fn launch(
        &self,
        _setup: &DuelSetup,
    ) -> Result<(DuelHandle, EngineReceiver), EngineError> {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        self.engines.lock().unwrap().push((input_rx, output_tx));
        Ok((DuelHandle::new(input_tx), output_rx))
    }
}

// =========================================================================
// Helpers
// =========================================================================

async fn start_server(repo: InMemoryMatchRepository) -> SocketAddr {
    let server = DuelhostServer::builder()
        .bind("127.0.0.1:0")
        .launcher(SilentLauncher::default())
        .repository(repo)
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

struct TestClient {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            decoder: FrameDecoder::with_max_len(u16::MAX as usize),
        }
    }

    /// Writes all `frames` in a single write.
    async fn send(&mut self, frames: &[Bytes]) {
        let joined: Vec<u8> = frames.iter().flat_map(|f| f.iter().copied()).collect();
        self.stream.write_all(&joined).await.unwrap();
    }

    /// Next frame payload from the server.
    async fn next(&mut self) -> Bytes {
        tokio::time::timeout(Duration::from_secs(2), async {
            let mut buf = [0u8; 1024];
            loop {
                if self.decoder.is_message_ready() {
                    return self.decoder.take_message().unwrap();
                }
                let n = self.stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "server closed the connection");
                self.decoder.feed(&buf[..n]).unwrap();
            }
        })
        .await
        .expect("timed out waiting for a frame")
    }

    /// Skips frames until one with `cmd`'s code arrives.
    async fn expect(&mut self, cmd: ServerCommand) -> Bytes {
        loop {
            let payload = self.next().await;
            if payload[0] == cmd.code() {
                return payload;
            }
        }
    }

    /// `true` once the server has closed the socket.
    async fn closed_by_server(&mut self) -> bool {
        let mut buf = [0u8; 256];
        let read = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match self.stream.read(&mut buf).await {
                    Ok(0) | Err(_) => return true,
                    Ok(_) => continue,
                }
            }
        })
        .await;
        read.unwrap_or(false)
    }
}

fn player_info(name: &str) -> Bytes {
    client_frame(ClientCommand::PlayerInfo.code(), |b| {
        PlayerInfo { name: name.into() }.encode(b)
    })
    .unwrap()
}

fn create_game(best_of: i32) -> Bytes {
    let req = CreateGameRequest {
        host: HostInfo {
            team1: 1,
            team2: 1,
            best_of,
            start_lp: 8000,
            start_hand: 5,
            draw_count: 1,
            ..HostInfo::default()
        },
        name: "Ranked".into(),
        password: String::new(),
        notes: String::new(),
        password_set: false,
    };
    client_frame(ClientCommand::CreateGame.code(), |b| req.encode(b)).unwrap()
}

fn join_game(room_id: u32) -> Bytes {
    let req = JoinGameRequest {
        version: 0x1360,
        room_id,
        password: String::new(),
    };
    client_frame(ClientCommand::JoinGame.code(), |b| req.encode(b)).unwrap()
}

fn command(cmd: ClientCommand, body: &[u8]) -> Bytes {
    client_frame(cmd.code(), |b| b.put_slice(body)).unwrap()
}

fn ready_with_deck(first_card: u32) -> Bytes {
    let deck = Deck {
        main: (first_card..first_card + 40).collect(),
        side: Vec::new(),
    };
    let mut body = BytesMut::new();
    deck.encode(&mut body);
    command(ClientCommand::Ready, &body)
}

/// Host in room 1 and a guest seated next to it, welcome traffic read.
async fn seated_pair(addr: SocketAddr) -> (TestClient, TestClient) {
    let mut host = TestClient::connect(addr).await;
    host.send(&[player_info("Yugi"), create_game(1)]).await;
    host.expect(ServerCommand::PlayerEnter).await;

    let mut guest = TestClient::connect(addr).await;
    guest.send(&[player_info("Joey"), join_game(1)]).await;
    guest.expect(ServerCommand::JoinGame).await;
    let seat = guest.expect(ServerCommand::TypeChange).await;
    assert_eq!(seat[1], 1);
    guest.expect(ServerCommand::PlayerEnter).await;
    guest.expect(ServerCommand::PlayerEnter).await;
    host.expect(ServerCommand::PlayerEnter).await;
    (host, guest)
}

// =========================================================================
// Lobby
// =========================================================================

#[tokio::test]
async fn test_create_game_welcomes_host() {
    let addr = start_server(InMemoryMatchRepository::new()).await;
    let mut host = TestClient::connect(addr).await;
    host.send(&[player_info("Yugi"), create_game(3)]).await;

    let join = host.next().await;
    assert_eq!(join[0], ServerCommand::JoinGame.code());
    let seat = host.next().await;
    assert_eq!(&seat[..], &[ServerCommand::TypeChange.code(), 0x10]);
    let enter = host.next().await;
    assert_eq!(enter[0], ServerCommand::PlayerEnter.code());
    assert_eq!(&enter[1..9], &[b'Y', 0, b'u', 0, b'g', 0, b'i', 0]);
}

#[tokio::test]
async fn test_join_unknown_room_reports_error() {
    let addr = start_server(InMemoryMatchRepository::new()).await;
    let mut client = TestClient::connect(addr).await;
    client.send(&[player_info("Joey"), join_game(42)]).await;

    let err = client.expect(ServerCommand::ErrorMsg).await;
    assert_eq!(err[1], error_kind::JOIN_ERROR);
    assert_eq!(
        u32::from_le_bytes([err[5], err[6], err[7], err[8]]),
        error_kind::JOIN_NOT_FOUND
    );
}

#[tokio::test]
async fn test_join_full_room_reports_error() {
    let addr = start_server(InMemoryMatchRepository::new()).await;
    let (_host, _guest) = seated_pair(addr).await;

    let mut late = TestClient::connect(addr).await;
    late.send(&[player_info("Mai"), join_game(1)]).await;
    let err = late.expect(ServerCommand::ErrorMsg).await;
    assert_eq!(
        u32::from_le_bytes([err[5], err[6], err[7], err[8]]),
        error_kind::JOIN_FULL
    );
}

// =========================================================================
// Framing
// =========================================================================

#[tokio::test]
async fn test_three_frames_in_one_write_apply_in_order() {
    let addr = start_server(InMemoryMatchRepository::new()).await;
    let (mut host, mut guest) = seated_pair(addr).await;

    host.send(&[
        command(ClientCommand::Ready, &[]),
        command(ClientCommand::NotReady, &[]),
        command(ClientCommand::Ready, &[]),
    ])
    .await;

    let mut statuses = Vec::new();
    for _ in 0..3 {
        statuses.push(guest.expect(ServerCommand::PlayerChange).await[1]);
    }
    assert_eq!(
        statuses,
        vec![
            player_change::READY_HOST,
            player_change::NOT_READY_HOST,
            player_change::READY_HOST,
        ]
    );
}

#[tokio::test]
async fn test_frame_split_across_writes() {
    let addr = start_server(InMemoryMatchRepository::new()).await;
    let (mut host, mut guest) = seated_pair(addr).await;

    let ready = command(ClientCommand::Ready, &[]);
    guest.send(&[ready.slice(..1)]).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    guest.send(&[ready.slice(1..)]).await;

    let change = host.expect(ServerCommand::PlayerChange).await;
    assert_eq!(change[1], player_change::READY_GUEST);
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let addr = start_server(InMemoryMatchRepository::new()).await;
    let mut client = TestClient::connect(addr).await;
    client.send(&[Bytes::from_static(&[0xff, 0xff, 0x10])]).await;
    assert!(client.closed_by_server().await);
}

#[tokio::test]
async fn test_unknown_command_is_ignored() {
    let addr = start_server(InMemoryMatchRepository::new()).await;
    let (mut host, mut guest) = seated_pair(addr).await;

    host.send(&[command(ClientCommand::Ready, &[])]).await;
    assert_eq!(host.expect(ServerCommand::PlayerChange).await[1], player_change::READY_HOST);

    guest.send(&[
        Bytes::from_static(&[2, 0, 0x77, 0x01]),
        command(ClientCommand::Ready, &[]),
    ])
    .await;
    assert_eq!(host.expect(ServerCommand::PlayerChange).await[1], player_change::READY_GUEST);
    assert_eq!(guest.expect(ServerCommand::PlayerChange).await[1], player_change::READY_HOST);
}

// =========================================================================
// Leaving and match results
// =========================================================================

#[tokio::test]
async fn test_disconnect_frees_seat() {
    let addr = start_server(InMemoryMatchRepository::new()).await;
    let (mut host, guest) = seated_pair(addr).await;

    drop(guest);
    let change = host.expect(ServerCommand::PlayerChange).await;
    assert_eq!(change[1], player_change::leave(1));

    let mut next = TestClient::connect(addr).await;
    next.send(&[player_info("Mai"), join_game(1)]).await;
    let seat = next.expect(ServerCommand::TypeChange).await;
    assert_eq!(seat[1], 1);
}

#[tokio::test]
async fn test_surrender_records_match() {
    let repo = InMemoryMatchRepository::new();
    let addr = start_server(repo.clone()).await;
    let (mut host, mut guest) = seated_pair(addr).await;

    host.send(&[ready_with_deck(1000)]).await;
    guest.send(&[ready_with_deck(2000)]).await;
    guest.expect(ServerCommand::PlayerChange).await;
    guest.expect(ServerCommand::PlayerChange).await;

    host.send(&[command(ClientCommand::Start, &[])]).await;
    host.expect(ServerCommand::ChooseOrder).await;
    host.send(&[command(ClientCommand::TurnChoice, &[1])]).await;
    host.send(&[command(ClientCommand::Surrender, &[])]).await;

    guest.expect(ServerCommand::DuelEnd).await;
    host.expect(ServerCommand::DuelEnd).await;

    tokio::time::timeout(Duration::from_secs(2), async {
        while repo.score("Joey") == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("match never recorded");

    let history = repo.duels("Yugi");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].winner_team, 1);
    assert_eq!(repo.score("Yugi"), 0);
}
