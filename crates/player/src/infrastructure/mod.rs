pub mod clock;
pub mod config;
pub mod messaging;
pub mod websocket;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export the types most callers need
pub use config::{OverflowPolicy, ReconnectConfig, SessionConfig};
pub use messaging::{ConnectionState, EventBus};
pub use websocket::{Credential, SessionClient};
