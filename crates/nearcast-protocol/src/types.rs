//! Message types for Nearcast's wire format.
//!
//! Every message is an internally tagged JSON object: the `type` field
//! names the variant and the remaining fields are camelCase. Browser
//! clients switch on `message.type` directly.

use std::fmt;

use nearcast_transport::ConnectionId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A player's identity on the wire.
///
/// A player *is* its connection, so this is the [`ConnectionId`] under a
/// name the protocol can serialize. `#[serde(transparent)]` makes it a
/// plain JSON number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

impl From<ConnectionId> for PlayerId {
    fn from(id: ConnectionId) -> Self {
        Self(id.into_inner())
    }
}

impl From<PlayerId> for ConnectionId {
    fn from(id: PlayerId) -> Self {
        ConnectionId::new(id.0)
    }
}

// ---------------------------------------------------------------------------
// World data
// ---------------------------------------------------------------------------

/// A player as seen by clients: identity, position, and display color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub color: String,
}

/// A STUN or TURN server clients should use when gathering candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// A credential-less server entry (typically STUN).
    pub fn stun(urls: impl Into<String>) -> Self {
        Self {
            urls: urls.into(),
            username: None,
            credential: None,
        }
    }

    /// A TURN server entry with credentials.
    pub fn turn(
        urls: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: urls.into(),
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }
}

/// World constants sent to every client in `init`.
///
/// Fixed at process start; clients use them to draw the map, clamp their
/// own optimistic movement, and configure their peer connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldInfo {
    pub world_width: f64,
    pub world_height: f64,
    pub player_radius: f64,
    pub proximity_threshold: f64,
    pub broadcast_interval_ms: u64,
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
}

// ---------------------------------------------------------------------------
// Signaling
// ---------------------------------------------------------------------------

/// Lifecycle of one peer-to-peer negotiation between two players.
///
/// ```text
/// Idle → OfferSent → AnswerPending → Connected
///   └──────────┴────────────┴───────────┴──→ Closed
/// ```
///
/// Only `Connected` and `Closed` are ever reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Idle,
    OfferSent,
    AnswerPending,
    Connected,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::OfferSent => "offer-sent",
            Self::AnswerPending => "answer-pending",
            Self::Connected => "connected",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Which negotiation step a [`Signal`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
        };
        f.write_str(s)
    }
}

/// An opaque negotiation message routed from `sender` to `target`.
///
/// The server only reads the routing fields. `payload` (an SDP blob or an
/// ICE candidate) is carried verbatim. Older clients put the payload under
/// `offer`, `answer`, or `candidate`; those names are accepted on input,
/// and relayed server messages carry the payload under that name as well
/// as under `payload`.
///
/// `sender` is optional on input because the server overwrites it with the
/// identity of the connection the frame arrived on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireSignal")]
pub struct Signal {
    pub target: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<PlayerId>,
    pub payload: serde_json::Value,
}

/// Inbound shape of a [`Signal`]: `payload` or any one legacy name.
/// `payload` wins when several are present.
#[derive(Deserialize)]
struct WireSignal {
    target: PlayerId,
    #[serde(default)]
    sender: Option<PlayerId>,
    #[serde(default, deserialize_with = "present")]
    payload: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "present")]
    offer: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "present")]
    answer: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "present")]
    candidate: Option<serde_json::Value>,
}

/// Keeps an explicit `null` as `Some(Value::Null)`; only a missing field
/// is `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl TryFrom<WireSignal> for Signal {
    type Error = &'static str;

    fn try_from(wire: WireSignal) -> Result<Self, Self::Error> {
        let payload = wire
            .payload
            .or(wire.offer)
            .or(wire.answer)
            .or(wire.candidate)
            .ok_or("missing field `payload`")?;
        Ok(Self {
            target: wire.target,
            sender: wire.sender,
            payload,
        })
    }
}

/// Writes a relayed signal with the payload under both `payload` and
/// `legacy`.
fn serialize_relayed<S>(
    signal: &Signal,
    legacy: &'static str,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeStruct;

    let mut state = serializer.serialize_struct("Signal", 4)?;
    state.serialize_field("target", &signal.target)?;
    match &signal.sender {
        Some(sender) => state.serialize_field("sender", sender)?,
        None => state.skip_field("sender")?,
    }
    state.serialize_field("payload", &signal.payload)?;
    state.serialize_field(legacy, &signal.payload)?;
    state.end()
}

fn relayed_offer<S: serde::Serializer>(signal: &Signal, serializer: S) -> Result<S::Ok, S::Error> {
    serialize_relayed(signal, "offer", serializer)
}

fn relayed_answer<S: serde::Serializer>(signal: &Signal, serializer: S) -> Result<S::Ok, S::Error> {
    serialize_relayed(signal, "answer", serializer)
}

fn relayed_candidate<S: serde::Serializer>(
    signal: &Signal,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serialize_relayed(signal, "candidate", serializer)
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Requested new position. The server clamps it to world bounds.
    Move { x: f64, y: f64 },
    Offer(Signal),
    Answer(Signal),
    #[serde(rename = "ice-candidate")]
    IceCandidate(Signal),
}

impl ClientMessage {
    /// Splits a signaling message into its kind and body.
    ///
    /// Returns `None` for non-signaling messages.
    pub fn into_signal(self) -> Option<(SignalKind, Signal)> {
        match self {
            Self::Offer(s) => Some((SignalKind::Offer, s)),
            Self::Answer(s) => Some((SignalKind::Answer, s)),
            Self::IceCandidate(s) => Some((SignalKind::IceCandidate, s)),
            Self::Move { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Bootstrap, sent once right after connecting.
    Init {
        id: PlayerId,
        players: Vec<PlayerView>,
        config: WorldInfo,
    },

    /// Full replace-style snapshot of every player.
    PositionUpdate { players: Vec<PlayerView> },

    /// The player named by `peer_id` entered or left interaction range.
    Proximity { peer_id: PlayerId, in_range: bool },

    /// "You start negotiating with `peer_id`": create and send an offer.
    Initiate { peer_id: PlayerId },

    /// The negotiation with `peer_id` reached `state`.
    SessionState {
        peer_id: PlayerId,
        state: SessionState,
    },

    #[serde(serialize_with = "relayed_offer")]
    Offer(Signal),
    #[serde(serialize_with = "relayed_answer")]
    Answer(Signal),
    #[serde(rename = "ice-candidate", serialize_with = "relayed_candidate")]
    IceCandidate(Signal),
}

impl ServerMessage {
    /// Wraps a routed signal back into the message of the same kind.
    pub fn signal(kind: SignalKind, signal: Signal) -> Self {
        match kind {
            SignalKind::Offer => Self::Offer(signal),
            SignalKind::Answer => Self::Answer(signal),
            SignalKind::IceCandidate => Self::IceCandidate(signal),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The browser client switches on exact `type` strings and reads
    //! camelCase fields, so these tests pin the JSON shapes.

    use serde_json::json;

    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_player_id_converts_from_connection_id() {
        let pid = PlayerId::from(ConnectionId::new(9));
        assert_eq!(pid, PlayerId(9));
        assert_eq!(ConnectionId::from(pid), ConnectionId::new(9));
    }

    // =====================================================================
    // Client messages
    // =====================================================================

    #[test]
    fn test_client_move_decodes() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"move","x":1.5,"y":-3}"#).unwrap();
        assert_eq!(msg, ClientMessage::Move { x: 1.5, y: -3.0 });
    }

    #[test]
    fn test_client_move_missing_field_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"move","x":1.5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_client_move_non_numeric_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"move","x":"left","y":0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_client_unknown_type_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"teleport","x":0,"y":0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_client_offer_with_payload_field() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "offer",
            "target": 2,
            "payload": { "type": "offer", "sdp": "v=0" }
        }))
        .unwrap();

        let (kind, signal) = msg.into_signal().unwrap();
        assert_eq!(kind, SignalKind::Offer);
        assert_eq!(signal.target, PlayerId(2));
        assert_eq!(signal.sender, None);
        assert_eq!(signal.payload["sdp"], "v=0");
    }

    #[test]
    fn test_client_signal_accepts_legacy_payload_names() {
        let answer: ClientMessage = serde_json::from_value(json!({
            "type": "answer",
            "target": 1,
            "sender": 2,
            "answer": { "sdp": "a" }
        }))
        .unwrap();
        let (kind, signal) = answer.into_signal().unwrap();
        assert_eq!(kind, SignalKind::Answer);
        assert_eq!(signal.sender, Some(PlayerId(2)));
        assert_eq!(signal.payload["sdp"], "a");

        let candidate: ClientMessage = serde_json::from_value(json!({
            "type": "ice-candidate",
            "target": 1,
            "candidate": { "candidate": "candidate:1 1 udp" }
        }))
        .unwrap();
        assert!(matches!(
            candidate.into_signal(),
            Some((SignalKind::IceCandidate, _))
        ));
    }

    #[test]
    fn test_client_signal_without_target_is_rejected() {
        let result: Result<ClientMessage, _> = serde_json::from_value(json!({
            "type": "offer",
            "payload": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_client_move_is_not_a_signal() {
        assert!(ClientMessage::Move { x: 0.0, y: 0.0 }.into_signal().is_none());
    }

    // =====================================================================
    // Server messages
    // =====================================================================

    #[test]
    fn test_server_init_json_format() {
        let msg = ServerMessage::Init {
            id: PlayerId(3),
            players: vec![PlayerView {
                id: PlayerId(3),
                x: 10.0,
                y: 20.0,
                color: "#a1b2c3".into(),
            }],
            config: WorldInfo {
                world_width: 800.0,
                world_height: 600.0,
                player_radius: 15.0,
                proximity_threshold: 60.0,
                broadcast_interval_ms: 50,
                ice_servers: vec![IceServer::stun("stun:stun.example.org:3478")],
            },
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "init");
        assert_eq!(json["id"], 3);
        assert_eq!(json["players"][0]["color"], "#a1b2c3");
        assert_eq!(json["config"]["worldWidth"], 800.0);
        assert_eq!(json["config"]["worldHeight"], 600.0);
        assert_eq!(json["config"]["playerRadius"], 15.0);
        assert_eq!(json["config"]["broadcastIntervalMs"], 50);
        assert_eq!(
            json["config"]["iceServers"][0]["urls"],
            "stun:stun.example.org:3478"
        );
        // Optional credentials are omitted, not null.
        assert!(json["config"]["iceServers"][0].get("username").is_none());
    }

    #[test]
    fn test_server_position_update_json_format() {
        let msg = ServerMessage::PositionUpdate { players: vec![] };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, json!({ "type": "positionUpdate", "players": [] }));
    }

    #[test]
    fn test_server_proximity_json_format() {
        let msg = ServerMessage::Proximity {
            peer_id: PlayerId(8),
            in_range: true,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({ "type": "proximity", "peerId": 8, "inRange": true })
        );
    }

    #[test]
    fn test_server_session_state_json_format() {
        let msg = ServerMessage::SessionState {
            peer_id: PlayerId(1),
            state: SessionState::Closed,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({ "type": "sessionState", "peerId": 1, "state": "closed" })
        );
    }

    #[test]
    fn test_server_ice_candidate_keeps_hyphenated_type() {
        let msg = ServerMessage::signal(
            SignalKind::IceCandidate,
            Signal {
                target: PlayerId(2),
                sender: Some(PlayerId(1)),
                payload: json!({ "candidate": "c" }),
            },
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ice-candidate");
        assert_eq!(json["sender"], 1);
        assert_eq!(json["target"], 2);
        assert_eq!(json["payload"]["candidate"], "c");
        assert_eq!(json["candidate"]["candidate"], "c");
    }

    #[test]
    fn test_server_relayed_signal_carries_legacy_field() {
        // Older clients destructure `{ offer, sender }` / `{ answer, sender }`.
        let signal = Signal {
            target: PlayerId(2),
            sender: Some(PlayerId(1)),
            payload: json!({ "type": "offer", "sdp": "v=0" }),
        };
        let offer = serde_json::to_value(ServerMessage::Offer(signal.clone())).unwrap();
        assert_eq!(offer["offer"], offer["payload"]);
        assert_eq!(offer["sender"], 1);
        assert!(offer.get("answer").is_none());

        let answer = serde_json::to_value(ServerMessage::Answer(signal)).unwrap();
        assert_eq!(answer["answer"]["sdp"], "v=0");
        assert!(answer.get("offer").is_none());
    }

    #[test]
    fn test_server_relayed_signal_decodes_back() {
        let msg = ServerMessage::Offer(Signal {
            target: PlayerId(2),
            sender: Some(PlayerId(1)),
            payload: json!({ "sdp": "v=0" }),
        });
        let text = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_client_signal_null_payload_is_kept() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "ice-candidate",
            "target": 1,
            "candidate": null
        }))
        .unwrap();
        let (_, signal) = msg.into_signal().unwrap();
        assert_eq!(signal.payload, serde_json::Value::Null);
    }

    #[test]
    fn test_client_signal_without_payload_is_rejected() {
        let result: Result<ClientMessage, _> = serde_json::from_value(json!({
            "type": "answer",
            "target": 1
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_session_state_display_matches_wire_name() {
        for state in [
            SessionState::Idle,
            SessionState::OfferSent,
            SessionState::AnswerPending,
            SessionState::Connected,
            SessionState::Closed,
        ] {
            let wire = serde_json::to_value(state).unwrap();
            assert_eq!(wire, state.to_string());
        }
    }
}
