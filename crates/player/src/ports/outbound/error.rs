//! Error types for the session client.

use std::time::Duration;

use holdem_shared::DecodeError;

use super::session_events::EventKind;

/// Failures of the physical socket.
///
/// Always recoverable from the session's point of view: they feed the
/// reconnection backoff instead of reaching callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The endpoint URL cannot be used for a socket.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// The socket could not be constructed or never opened.
    #[error("Failed to open socket: {0}")]
    Open(String),

    /// The socket reported an error while connecting or open.
    #[error("Socket error: {0}")]
    Socket(String),

    /// The socket closed before it finished opening.
    #[error("Socket closed during handshake (code {code}): {reason}")]
    ClosedDuringHandshake { code: u16, reason: String },

    /// No inbound frame within the heartbeat acknowledgment window.
    #[error("Peer unresponsive for {0:?}")]
    Unresponsive(Duration),
}

impl TransportError {
    pub fn open(message: impl ToString) -> Self {
        Self::Open(message.to_string())
    }

    pub fn socket(message: impl ToString) -> Self {
        Self::Socket(message.to_string())
    }
}

/// Errors surfaced by the session client, either as the result of the first
/// `connect()` or inside [`SessionEvent::Error`](super::SessionEvent::Error).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The attempt neither opened nor failed within the connect window.
    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The attempts ceiling was reached; only an explicit `connect()` retries.
    #[error("Reconnection gave up after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// A subscriber panicked; isolated from the other subscribers.
    #[error("Subscriber for {event:?} panicked: {message}")]
    Subscriber { event: EventKind, message: String },

    /// `disconnect()` was called before the pending attempt finished.
    #[error("Connection cancelled by disconnect")]
    Cancelled,

    /// The session driver task is no longer running.
    #[error("Session client is no longer running")]
    ClientGone,
}

impl SessionError {
    /// Whether the controller keeps retrying after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Decode(_) | Self::ConnectTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_failures_are_recoverable() {
        assert!(SessionError::ConnectTimeout(Duration::from_secs(10)).is_recoverable());
        assert!(SessionError::Transport(TransportError::Unresponsive(Duration::from_secs(60))).is_recoverable());
    }

    #[test]
    fn terminal_errors_are_not_recoverable() {
        assert!(!SessionError::ReconnectExhausted { attempts: 5 }.is_recoverable());
        assert!(!SessionError::Cancelled.is_recoverable());
        assert!(!SessionError::ClientGone.is_recoverable());
    }
}
