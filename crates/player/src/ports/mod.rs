//! Player port definitions.
//!
//! Outbound ports describe the collaborators the session client talks to
//! (domain state, user-facing notices, the clock) and the typed events it
//! publishes to them.

pub mod outbound;
