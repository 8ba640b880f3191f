//! Test doubles for the session client.
//!
//! Available to this crate's tests and, with the `testing` feature, to
//! downstream crates.

mod fixtures;
mod mock_transport;

pub use fixtures::{FixedClock, GameStateCall, RecordingGameState, RecordingNotices};
pub use mock_transport::{MockLink, MockTransportFactory, OpenBehavior, OpenRecord};
