//! End-to-end tests: a real server on a random port driven by WebSocket
//! clients.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use nearcast::prelude::*;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct Server {
    addr: String,
    world: WorldHandle,
    task: JoinHandle<Result<(), NearcastError>>,
}

/// Starts a server on a random port.
async fn start_server(world: WorldConfig) -> Server {
    let server = NearcastServer::builder()
        .bind("127.0.0.1:0")
        .world_config(world)
        .seed(7)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let world = server.world();
    let task = tokio::spawn(server.run());

    Server { addr, world, task }
}

/// A world so large that random spawns are never in range of each other,
/// with the periodic broadcast effectively off.
fn quiet_world() -> WorldConfig {
    WorldConfig {
        world_width: 100_000.0,
        world_height: 100_000.0,
        broadcast_interval: Duration::from_secs(3600),
        ..WorldConfig::default()
    }
}

struct Client {
    ws: ClientWs,
    id: PlayerId,
    players: Vec<PlayerView>,
}

impl Client {
    /// Connects and consumes the `init` message.
    async fn join(addr: &str) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("should connect");
        let mut client = Self {
            ws,
            id: PlayerId(0),
            players: Vec::new(),
        };
        match client.recv().await {
            ServerMessage::Init { id, players, .. } => {
                client.id = id;
                client.players = players;
            }
            other => panic!("expected init, got {other:?}"),
        }
        client
    }

    async fn send(&mut self, value: Value) {
        self.ws
            .send(Message::text(value.to_string()))
            .await
            .expect("send");
    }

    async fn send_move(&mut self, x: f64, y: f64) {
        self.send(json!({"type": "move", "x": x, "y": y})).await;
    }

    async fn recv_raw(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), self.ws.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("stream ended")
                .expect("recv");
            if msg.is_text() {
                return serde_json::from_slice(&msg.into_data()).expect("server sends JSON");
            }
        }
    }

    async fn recv(&mut self) -> ServerMessage {
        serde_json::from_value(self.recv_raw().await).expect("known server message")
    }

    /// Reads until `pred` matches; returns the match and everything before.
    async fn recv_until(
        &mut self,
        mut pred: impl FnMut(&ServerMessage) -> bool,
    ) -> (ServerMessage, Vec<ServerMessage>) {
        let mut skipped = Vec::new();
        loop {
            let msg = self.recv().await;
            if pred(&msg) {
                return (msg, skipped);
            }
            skipped.push(msg);
        }
    }

    async fn recv_snapshot_where(
        &mut self,
        mut pred: impl FnMut(&[PlayerView]) -> bool,
    ) -> Vec<PlayerView> {
        let (msg, _) = self
            .recv_until(|m| matches!(m, ServerMessage::PositionUpdate { players } if pred(players)))
            .await;
        match msg {
            ServerMessage::PositionUpdate { players } => players,
            _ => unreachable!(),
        }
    }
}

fn position_of(players: &[PlayerView], id: PlayerId) -> Option<(f64, f64)> {
    players.iter().find(|p| p.id == id).map(|p| (p.x, p.y))
}

/// Moves two fresh clients next to each other and returns them with the
/// initiator first.
async fn adjacent_pair(addr: &str) -> (Client, Client) {
    let mut a = Client::join(addr).await;
    let mut b = Client::join(addr).await;
    assert!(a.id < b.id, "connection ids are allocated in order");

    // The edge appears once both moves have landed, in either order.
    a.send_move(100.0, 100.0).await;
    b.send_move(102.0, 100.0).await;
    (a, b)
}

// =========================================================================
// Connect and snapshots
// =========================================================================

#[tokio::test]
async fn test_connect_receives_init_with_camel_case_config() {
    let server = start_server(WorldConfig::default()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", server.addr))
        .await
        .expect("should connect");

    let msg = ws.next().await.unwrap().expect("recv init");
    let init: Value = serde_json::from_slice(&msg.into_data()).unwrap();
    assert_eq!(init["type"], "init");
    assert!(init["id"].is_u64());
    assert_eq!(init["players"].as_array().unwrap().len(), 1);
    assert_eq!(init["config"]["worldWidth"], 800.0);
    assert_eq!(init["config"]["worldHeight"], 600.0);
    assert_eq!(init["config"]["playerRadius"], 15.0);
    assert_eq!(init["config"]["proximityThreshold"], 60.0);
    assert_eq!(init["config"]["broadcastIntervalMs"], 50);
    assert!(init["config"]["iceServers"][0]["urls"]
        .as_str()
        .unwrap()
        .starts_with("stun:"));

    let player = &init["players"][0];
    assert!(player["color"].as_str().unwrap().starts_with('#'));
    let (x, y) = (player["x"].as_f64().unwrap(), player["y"].as_f64().unwrap());
    assert!((15.0..=785.0).contains(&x) && (15.0..=585.0).contains(&y));
}

#[tokio::test]
async fn test_join_broadcasts_snapshot_immediately() {
    let server = start_server(quiet_world()).await;
    let mut a = Client::join(&server.addr).await;
    let b = Client::join(&server.addr).await;

    let players = a.recv_snapshot_where(|p| p.len() == 2).await;
    assert!(position_of(&players, b.id).is_some());
}

#[tokio::test]
async fn test_ticks_broadcast_periodically() {
    let server = start_server(WorldConfig::default()).await;
    let mut a = Client::join(&server.addr).await;

    let started = tokio::time::Instant::now();
    for _ in 0..4 {
        a.recv_until(|m| matches!(m, ServerMessage::PositionUpdate { .. }))
            .await;
    }
    assert!(started.elapsed() < Duration::from_secs(2));
}

// =========================================================================
// Movement
// =========================================================================

#[tokio::test]
async fn test_out_of_bounds_move_is_clamped() {
    let server = start_server(WorldConfig::default()).await;
    let mut a = Client::join(&server.addr).await;
    let id = a.id;

    a.send_move(-50.0, 9_999.0).await;
    let players = a
        .recv_snapshot_where(|p| position_of(p, id) == Some((15.0, 585.0)))
        .await;
    assert_eq!(players.len(), 1);
}

#[tokio::test]
async fn test_malformed_frames_are_ignored() {
    let server = start_server(WorldConfig::default()).await;
    let mut a = Client::join(&server.addr).await;
    let id = a.id;

    a.ws.send(Message::text("not json")).await.unwrap();
    a.ws.send(Message::binary(vec![0xff, 0x00, 0x13])).await.unwrap();
    a.send(json!({"type": "teleport", "x": 1})).await;
    a.send(json!({"type": "move", "x": "left"})).await;
    a.send_move(200.0, 250.0).await;

    a.recv_snapshot_where(|p| position_of(p, id) == Some((200.0, 250.0)))
        .await;
}

#[tokio::test]
async fn test_thousand_moves_never_touch_another_player() {
    let server = start_server(WorldConfig::default()).await;
    let mut a = Client::join(&server.addr).await;
    let mut b = Client::join(&server.addr).await;
    let b_home = position_of(&b.players, b.id).expect("own player in init");
    let a_id = a.id;

    for i in 0..1000 {
        a.send_move((i % 800) as f64, (i * 7 % 600) as f64).await;
    }
    a.send_move(400.0, 300.0).await;

    let players = b
        .recv_snapshot_where(|p| position_of(p, a_id) == Some((400.0, 300.0)))
        .await;
    assert_eq!(position_of(&players, b.id), Some(b_home));
}

// =========================================================================
// Proximity and signaling
// =========================================================================

#[tokio::test]
async fn test_entering_range_initiates_lower_id_only() {
    let server = start_server(quiet_world()).await;
    let (mut a, mut b) = adjacent_pair(&server.addr).await;

    let (_, before) = a
        .recv_until(|m| matches!(m, ServerMessage::Initiate { peer_id } if *peer_id == b.id))
        .await;
    assert!(before.contains(&ServerMessage::Proximity {
        peer_id: b.id,
        in_range: true
    }));

    let (_, before) = b
        .recv_until(|m| {
            matches!(m, ServerMessage::Proximity { peer_id, in_range: true } if *peer_id == a.id)
        })
        .await;
    assert!(!before
        .iter()
        .any(|m| matches!(m, ServerMessage::Initiate { .. })));
}

#[tokio::test]
async fn test_offer_answer_candidates_reach_connected() {
    let server = start_server(quiet_world()).await;
    let (mut a, mut b) = adjacent_pair(&server.addr).await;
    let (a_id, b_id) = (a.id, b.id);

    a.recv_until(|m| matches!(m, ServerMessage::Initiate { .. }))
        .await;
    a.send(json!({"type": "offer", "target": b_id, "payload": {"type": "offer", "sdp": "v=0 a"}}))
        .await;

    let (offer, _) = b
        .recv_until(|m| matches!(m, ServerMessage::Offer(_)))
        .await;
    match offer {
        ServerMessage::Offer(s) => {
            assert_eq!(s.sender, Some(a_id));
            assert_eq!(s.target, b_id);
            assert_eq!(s.payload["sdp"], "v=0 a");
        }
        _ => unreachable!(),
    }

    // Sent before the answer, so the server holds it until A has the answer.
    b.send(json!({"type": "ice-candidate", "target": a_id, "candidate": {"candidate": "c-b"}}))
        .await;
    b.send(json!({"type": "answer", "target": a_id, "answer": {"type": "answer", "sdp": "v=0 b"}}))
        .await;

    a.recv_until(|m| matches!(m, ServerMessage::Answer(_))).await;
    match a.recv().await {
        ServerMessage::IceCandidate(c) => {
            assert_eq!(c.sender, Some(b_id));
            assert_eq!(c.payload["candidate"], "c-b");
        }
        other => panic!("expected buffered candidate, got {other:?}"),
    }
    assert_eq!(
        a.recv().await,
        ServerMessage::SessionState {
            peer_id: b_id,
            state: SessionState::Connected
        }
    );
    b.recv_until(|m| {
        *m == ServerMessage::SessionState {
            peer_id: a_id,
            state: SessionState::Connected,
        }
    })
    .await;

    a.send(json!({"type": "ice-candidate", "target": b_id, "payload": {"candidate": "c-a"}}))
        .await;
    let (candidate, _) = b
        .recv_until(|m| matches!(m, ServerMessage::IceCandidate(_)))
        .await;
    assert!(matches!(candidate, ServerMessage::IceCandidate(c) if c.payload["candidate"] == "c-a"));
}

#[tokio::test]
async fn test_legacy_client_field_names_round_trip() {
    let server = start_server(quiet_world()).await;
    let (mut a, mut b) = adjacent_pair(&server.addr).await;
    let (a_id, b_id) = (a.id, b.id);

    a.recv_until(|m| matches!(m, ServerMessage::Initiate { .. }))
        .await;
    a.send(json!({"type": "offer", "target": b_id, "offer": {"type": "offer", "sdp": "v=0 a"}}))
        .await;

    // Read B's frames raw, the way an older client destructures them.
    let offer = loop {
        let raw = b.recv_raw().await;
        if raw["type"] == "offer" {
            break raw;
        }
    };
    assert_eq!(offer["offer"]["sdp"], "v=0 a");
    assert_eq!(offer["sender"], json!(a_id));

    b.send(json!({"type": "answer", "target": a_id, "answer": {"type": "answer", "sdp": "v=0 b"}}))
        .await;
    let answer = loop {
        let raw = a.recv_raw().await;
        if raw["type"] == "answer" {
            break raw;
        }
    };
    assert_eq!(answer["answer"]["sdp"], "v=0 b");
    assert_eq!(answer["sender"], json!(b_id));
}

#[tokio::test]
async fn test_spoofed_sender_is_overwritten() {
    let server = start_server(quiet_world()).await;
    let (mut a, mut b) = adjacent_pair(&server.addr).await;

    a.recv_until(|m| matches!(m, ServerMessage::Initiate { .. }))
        .await;
    a.send(json!({"type": "offer", "target": b.id, "sender": 424242, "payload": "sdp"}))
        .await;

    let (offer, _) = b
        .recv_until(|m| matches!(m, ServerMessage::Offer(_)))
        .await;
    assert!(matches!(offer, ServerMessage::Offer(s) if s.sender == Some(a.id)));
}

#[tokio::test]
async fn test_disconnect_notifies_survivor_exactly_once() {
    let server = start_server(quiet_world()).await;
    let (mut a, mut b) = adjacent_pair(&server.addr).await;
    let (a_id, b_id) = (a.id, b.id);

    a.recv_until(|m| matches!(m, ServerMessage::Initiate { .. }))
        .await;
    a.send(json!({"type": "offer", "target": b_id, "payload": "o"}))
        .await;
    b.recv_until(|m| matches!(m, ServerMessage::Offer(_))).await;
    b.send(json!({"type": "answer", "target": a_id, "payload": "a"}))
        .await;
    a.recv_until(|m| matches!(m, ServerMessage::SessionState { state: SessionState::Connected, .. }))
        .await;

    b.ws.close(None).await.unwrap();

    let (_, before) = a
        .recv_until(|m| matches!(m, ServerMessage::PositionUpdate { players } if players.len() == 1))
        .await;
    let closed = before
        .iter()
        .filter(|m| {
            **m == ServerMessage::SessionState {
                peer_id: b_id,
                state: SessionState::Closed,
            }
        })
        .count();
    assert_eq!(closed, 1);
    assert!(before.contains(&ServerMessage::Proximity {
        peer_id: b_id,
        in_range: false
    }));

    let stats = server.world.stats().await.unwrap();
    assert_eq!((stats.players, stats.edges, stats.sessions), (1, 0, 0));
}

#[tokio::test]
async fn test_moving_apart_closes_session() {
    let server = start_server(quiet_world()).await;
    let (mut a, mut b) = adjacent_pair(&server.addr).await;
    let b_id = b.id;

    a.recv_until(|m| matches!(m, ServerMessage::Initiate { .. }))
        .await;
    b.send_move(500.0, 100.0).await;

    let (_, before) = a
        .recv_until(|m| {
            *m == ServerMessage::SessionState {
                peer_id: b_id,
                state: SessionState::Closed,
            }
        })
        .await;
    assert!(before.contains(&ServerMessage::Proximity {
        peer_id: b_id,
        in_range: false
    }));
}

#[tokio::test]
async fn test_signal_without_session_is_dropped() {
    let server = start_server(WorldConfig {
        broadcast_interval: Duration::from_millis(50),
        ..quiet_world()
    })
    .await;
    let mut a = Client::join(&server.addr).await;
    let mut b = Client::join(&server.addr).await;
    let a_id = a.id;

    a.send(json!({"type": "offer", "target": b.id, "payload": "o"}))
        .await;
    // Same connection, so the offer was handled before this move.
    a.send_move(500.0, 500.0).await;

    let (_, before) = b
        .recv_until(|m| {
            matches!(m, ServerMessage::PositionUpdate { players }
                if position_of(players, a_id) == Some((500.0, 500.0)))
        })
        .await;
    assert!(!before.iter().any(|m| matches!(m, ServerMessage::Offer(_))));
}

#[tokio::test]
async fn test_silent_tcp_client_does_not_block_joins() {
    let server = start_server(quiet_world()).await;

    // Opens a socket and never sends the upgrade request.
    let _silent = tokio::net::TcpStream::connect(&server.addr)
        .await
        .expect("tcp connect");

    let joined = tokio::time::timeout(Duration::from_secs(3), Client::join(&server.addr)).await;
    assert!(joined.is_ok(), "a stalled handshake must not hold up accept");
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_world_shutdown_stops_server() {
    let server = start_server(quiet_world()).await;
    let _a = Client::join(&server.addr).await;

    server.world.shutdown().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), server.task)
        .await
        .expect("server should exit after world shutdown")
        .expect("server task should not panic");
    assert!(result.is_ok());
}
