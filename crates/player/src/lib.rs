//! Holdem Player - session client for the table server.
//!
//! A caller-owned [`SessionClient`] keeps one socket to the server alive:
//! it queues messages while disconnected, reconnects with exponential
//! backoff, sends heartbeats while open and publishes typed
//! [`SessionEvent`]s to subscribers.

pub mod infrastructure;
pub mod ports;

pub use infrastructure::config::{OverflowPolicy, ReconnectConfig, SessionConfig};
pub use infrastructure::messaging::{ConnectionState, EventBus, SubscriptionId};
pub use infrastructure::websocket::{Credential, SessionClient, SessionClientBuilder, SessionSnapshot};
pub use ports::outbound::{EventKind, SessionError, SessionEvent, TransportError};
