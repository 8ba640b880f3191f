//! Event Bus and connection-state messaging infrastructure.
//!
//! - `EventBus`: publish typed session events to subscribers
//! - `ConnectionStateObserver`: read the session's readiness state
//!
//! The session driver (in the websocket module) is the only publisher.

pub mod connection;
pub mod event_bus;

pub use connection::{set_connection_state, ConnectionState, ConnectionStateObserver};
pub use event_bus::{EventBus, SubscriptionId};
