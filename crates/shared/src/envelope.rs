//! Text-frame envelope and codec.
//!
//! Every physical WebSocket text frame carries exactly one envelope:
//!
//! ```json
//! { "type": "join_room", "payload": { "room_id": 7 } }
//! ```
//!
//! `payload` is optional on the wire. Frames without one (or with an explicit
//! `null`) decode to `None`, and `None` is omitted when encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors produced while decoding an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not a JSON object with a string `type` field.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The envelope is valid but its payload does not match the shape of `kind`.
    #[error("invalid payload for {kind}: {message}")]
    InvalidPayload { kind: String, message: String },
}

impl DecodeError {
    pub fn malformed(message: impl ToString) -> Self {
        Self::Malformed(message.to_string())
    }

    pub fn invalid_payload(kind: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidPayload {
            kind: kind.into(),
            message: message.to_string(),
        }
    }
}

/// Errors produced while encoding an outbound frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to encode {kind} frame: {message}")]
pub struct EncodeError {
    pub kind: String,
    pub message: String,
}

/// The `{type, payload}` wrapper around every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Serialize to a single text frame.
    ///
    /// Field order is fixed (`type` first) and object keys inside the payload
    /// are emitted in sorted order, so equal envelopes always encode to equal
    /// strings.
    pub fn encode(&self) -> Result<String, EncodeError> {
        serde_json::to_string(self).map_err(|e| EncodeError {
            kind: self.kind.clone(),
            message: e.to_string(),
        })
    }

    /// Parse a single text frame.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(raw).map_err(DecodeError::malformed)
    }
}

/// Encode `kind` and `payload` into a text frame.
pub fn encode(kind: &str, payload: Option<Value>) -> Result<String, EncodeError> {
    Envelope::new(kind, payload).encode()
}

/// Decode a text frame into its envelope.
pub fn decode(raw: &str) -> Result<Envelope, DecodeError> {
    Envelope::decode(raw)
}
