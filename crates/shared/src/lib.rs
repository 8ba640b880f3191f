//! Holdem Shared - wire types for the table server WebSocket connection
//!
//! This crate contains the types exchanged with the table server over the
//! real-time channel:
//! - The text-frame envelope (`{type, payload}`) and its codec
//! - Outbound `ClientMessage` variants (Player → Server)
//! - Inbound `ServerMessage` variants (Server → Player) and their payloads
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, serde_json, and thiserror
//! 2. **No connection logic** - Pure data types and serialization
//! 3. **Forward compatible** - Unknown inbound types decode to `ServerMessage::Unknown`

pub mod envelope;
pub mod messages;

pub use envelope::{decode, encode, DecodeError, EncodeError, Envelope};
pub use messages::{
    ClientMessage, ErrorData, HeartbeatData, NotificationData, PlayerActionData, PlayerActionKind,
    ServerMessage,
};
