//! Connection lifecycle state.
//!
//! The session driver is the only writer of the state; any number of
//! [`ConnectionStateObserver`]s read it lock-free for UI binding.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Readiness state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, `connect()` never called
    Idle,
    /// A connection attempt is in flight
    Connecting,
    /// Socket open; heartbeat running
    Open,
    /// Connection lost; waiting out the backoff delay before the next attempt
    Recovering,
    /// Attempts ceiling reached; only an explicit `connect()` leaves this state
    Exhausted,
    /// Closed by `disconnect()`; no automatic reconnection
    ManuallyClosed,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Idle => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Open => 2,
            ConnectionState::Recovering => 3,
            ConnectionState::Exhausted => 4,
            ConnectionState::ManuallyClosed => 5,
        }
    }

    /// Convert from u8 (atomic storage).
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Recovering,
            4 => ConnectionState::Exhausted,
            5 => ConnectionState::ManuallyClosed,
            _ => ConnectionState::Idle,
        }
    }

    /// A `connect()` in this state is a no-op.
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

/// Observable connection state for UI binding.
///
/// Cloning is cheap; all clones share the same underlying state.
#[derive(Clone)]
pub struct ConnectionStateObserver {
    state: Arc<AtomicU8>,
}

impl ConnectionStateObserver {
    /// Create a new observer from a shared state Arc.
    pub fn new(state: Arc<AtomicU8>) -> Self {
        Self { state }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Check if currently open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}

/// Internal helper to update connection state (used by the session driver).
pub fn set_connection_state(state_ref: &AtomicU8, new_state: ConnectionState) {
    state_ref.store(new_state.to_u8(), Ordering::SeqCst);
}
