//! WebSocket message types for Player-Server communication
//!
//! `ClientMessage` is what the player sends; `ServerMessage` is the typed view of
//! what the table server pushes. Both travel inside the `{type, payload}`
//! envelope defined in [`crate::envelope`].
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Renaming variants is a breaking change
//! - Unknown inbound types decode to `ServerMessage::Unknown`

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::{DecodeError, EncodeError, Envelope};

// =============================================================================
// Client Messages (Player → Server)
// =============================================================================

/// Messages from the player to the table server.
///
/// Serialized adjacently tagged, so every variant produces a full envelope:
/// `{"type":"join_room","payload":{"room_id":7}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Take a seat in a room
    JoinRoom { room_id: u64 },
    /// Leave the current room
    LeaveRoom {},
    /// Act on the current hand
    PlayerAction {
        action: PlayerActionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<u64>,
    },
    /// Liveness probe, `timestamp` in milliseconds since the Unix epoch
    Heartbeat { timestamp: i64 },
}

impl ClientMessage {
    /// Wire name of this message's `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom {} => "leave_room",
            Self::PlayerAction { .. } => "player_action",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }

    /// Encode into a single text frame.
    pub fn encode(&self) -> Result<String, EncodeError> {
        serde_json::to_string(self).map_err(|e| EncodeError {
            kind: self.kind().to_string(),
            message: e.to_string(),
        })
    }
}

/// Betting actions a player can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerActionKind {
    Call,
    Raise,
    Fold,
    Check,
    AllIn,
}

// =============================================================================
// Server Messages (Server → Player)
// =============================================================================

/// Typed view of an inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Full game snapshot for the current table
    GameStateUpdate(Value),
    /// Room snapshot (seats, status, blinds)
    RoomUpdate(Value),
    /// Another player acted
    PlayerAction(PlayerActionData),
    /// Server-side error for something this player sent
    Error(ErrorData),
    /// Free-form notice to display
    Notification(NotificationData),
    /// Heartbeat acknowledgment
    Heartbeat(HeartbeatData),
    /// Any type this client does not know (e.g. `connected`, `pong`)
    Unknown { kind: String, payload: Option<Value> },
}

impl ServerMessage {
    /// Interpret an envelope according to its `type`.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, DecodeError> {
        let kind = envelope.kind.as_str();
        let payload = envelope.payload.as_ref();

        Ok(match kind {
            "game_state_update" => Self::GameStateUpdate(require_payload(kind, payload)?),
            "room_update" => Self::RoomUpdate(require_payload(kind, payload)?),
            "player_action" => Self::PlayerAction(parse_payload(kind, payload)?),
            "error" => Self::Error(parse_payload(kind, payload)?),
            "notification" => Self::Notification(parse_payload(kind, payload)?),
            "heartbeat" => Self::Heartbeat(parse_payload(kind, payload)?),
            _ => Self::Unknown {
                kind: envelope.kind.clone(),
                payload: envelope.payload.clone(),
            },
        })
    }

    /// Wire name of this message's `type` field.
    pub fn kind(&self) -> &str {
        match self {
            Self::GameStateUpdate(_) => "game_state_update",
            Self::RoomUpdate(_) => "room_update",
            Self::PlayerAction(_) => "player_action",
            Self::Error(_) => "error",
            Self::Notification(_) => "notification",
            Self::Heartbeat(_) => "heartbeat",
            Self::Unknown { kind, .. } => kind,
        }
    }
}

fn require_payload(kind: &str, payload: Option<&Value>) -> Result<Value, DecodeError> {
    payload
        .cloned()
        .ok_or_else(|| DecodeError::invalid_payload(kind, "missing payload"))
}

/// Absent payloads parse as an empty object so all-optional shapes still decode.
fn parse_payload<T: DeserializeOwned>(kind: &str, payload: Option<&Value>) -> Result<T, DecodeError> {
    let value = payload
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    serde_json::from_value(value).map_err(|e| DecodeError::invalid_payload(kind, e))
}

/// Payload of an inbound `player_action`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerActionData {
    #[serde(default)]
    pub player_name: Option<String>,
    /// Raw action name; not limited to [`PlayerActionKind`]
    #[serde(default)]
    pub action: Option<String>,
    /// Remaining fields (amount, seat, ...) passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of an inbound `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload of an inbound `notification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub message: String,
    /// Display time in milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub position: Option<String>,
    /// Style hint (`positive`, `negative`, `warning`, `info`, ...)
    #[serde(default, rename = "type")]
    pub level: Option<String>,
}

/// Payload of an inbound `heartbeat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatData {
    #[serde(default)]
    pub timestamp: Option<i64>,
}
