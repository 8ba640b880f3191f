//! Session events - the typed events the client publishes to collaborators.
//!
//! Each inbound frame type and each lifecycle transition has its own variant,
//! so subscribers match on a closed set instead of string names.

use serde_json::Value;

use holdem_shared::{Envelope, ErrorData, NotificationData, PlayerActionData};

use super::error::SessionError;

/// Events published through the [`EventBus`](crate::infrastructure::messaging::EventBus).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    // =========================================================================
    // Lifecycle
    // =========================================================================
    /// The socket opened and the outbound queue was flushed
    Connected,
    /// The socket closed (deliberately or not)
    Closed { code: u16, reason: String },
    /// A transport failure or connect timeout
    Error(SessionError),
    /// Automatic reconnection stopped after `attempts` tries
    ReconnectExhausted { attempts: u32 },

    // =========================================================================
    // Inbound frames
    // =========================================================================
    /// Every successfully decoded frame, after its typed event
    Message(Envelope),
    GameStateUpdate(Value),
    RoomUpdate(Value),
    PlayerAction(PlayerActionData),
    /// Server `error` frame (distinct from transport errors)
    ServerError(ErrorData),
    Notification(NotificationData),
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Closed { .. } => EventKind::Closed,
            Self::Error(_) => EventKind::Error,
            Self::ReconnectExhausted { .. } => EventKind::ReconnectExhausted,
            Self::Message(_) => EventKind::Message,
            Self::GameStateUpdate(_) => EventKind::GameStateUpdate,
            Self::RoomUpdate(_) => EventKind::RoomUpdate,
            Self::PlayerAction(_) => EventKind::PlayerAction,
            Self::ServerError(_) => EventKind::ServerError,
            Self::Notification(_) => EventKind::Notification,
        }
    }
}

/// Discriminant of [`SessionEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Closed,
    Error,
    ReconnectExhausted,
    Message,
    GameStateUpdate,
    RoomUpdate,
    PlayerAction,
    ServerError,
    Notification,
}
