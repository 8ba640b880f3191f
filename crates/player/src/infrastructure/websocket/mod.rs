//! Resilient socket session to the table server
//!
//! - `client`: caller-facing handle and builder
//! - `controller`: the task that owns the connection lifecycle
//! - `core`: backoff, outbound queue and heartbeat timer
//! - `inbound`: routes decoded server frames to collaborators
//! - `transport`: the socket seam; `desktop` is the tokio-tungstenite implementation

mod client;
mod controller;
mod core;
mod inbound;
pub mod shared;
pub mod transport;

mod desktop;

#[cfg(test)]
mod tests;

pub use client::{Credential, SessionClient, SessionClientBuilder, SessionSnapshot};
pub use core::{BackoffState, HeartbeatMonitor, OutboundQueue};
pub use desktop::WsTransportFactory;
pub use inbound::{action_text, InboundRouter};
pub use shared::endpoint_url;
pub use transport::{Transport, TransportFactory, TransportHandle, TransportSignal};
