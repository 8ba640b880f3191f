//! Shared constants and endpoint helpers for the session client.
//!
//! Runtime-agnostic; the transport and the controller both read from here.

use std::time::Duration;

use url::Url;

use crate::ports::outbound::TransportError;

// Reconnection constants
pub const INITIAL_RETRY_DELAY_MS: u64 = 1_000;
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Close code for a deliberate client-initiated close.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code reported when the socket dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code reported when the peer's close frame carried no code.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Application close code for a peer that stopped answering heartbeats.
pub const CLOSE_UNRESPONSIVE: u16 = 4000;

pub const MANUAL_CLOSE_REASON: &str = "Manual disconnect";

/// Path of the real-time channel on the table server.
const WS_PATH: &str = "/ws";

/// Build the socket URL for `server_url`, carrying `token` as a query parameter.
///
/// The scheme mirrors the server's transport security: `https`/`wss` map to
/// `wss`, `http`/`ws` map to `ws`.
pub fn endpoint_url(server_url: &Url, token: &str) -> Result<Url, TransportError> {
    let scheme = match server_url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme `{other}` in {server_url}"
            )))
        }
    };

    let host = server_url
        .host_str()
        .ok_or_else(|| TransportError::InvalidUrl(format!("missing host in {server_url}")))?;
    let authority = match server_url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut url = Url::parse(&format!("{scheme}://{authority}{WS_PATH}"))
        .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}
