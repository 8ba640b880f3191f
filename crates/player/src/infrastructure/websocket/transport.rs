//! Transport seam between the session controller and a physical socket.
//!
//! A [`TransportFactory`] opens one socket per connection attempt. The socket
//! reports its lifecycle as [`TransportSignal`]s on a channel owned by the
//! controller, and is written to through the [`Transport`] handle.

use tokio::sync::mpsc;
use url::Url;

use crate::ports::outbound::TransportError;

/// Lifecycle notifications from one socket, in the order they happened.
///
/// A socket reports `Opened` at most once and `Closed` exactly once, last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    Opened,
    /// One inbound text frame
    Frame(String),
    Errored(String),
    Closed { code: u16, reason: String },
}

/// Write side of one socket.
pub trait Transport: Send {
    /// Write one text frame.
    ///
    /// Returns false if the socket is not writable; the frame was not sent.
    fn send(&mut self, frame: &str) -> bool;

    /// Start a close handshake. Idempotent.
    fn close(&mut self, code: u16, reason: &str);

    fn is_open(&self) -> bool;
}

/// A freshly constructed socket and its signal stream.
pub struct TransportHandle {
    pub link: Box<dyn Transport>,
    pub signals: mpsc::UnboundedReceiver<TransportSignal>,
}

impl TransportHandle {
    pub fn new(
        link: impl Transport + 'static,
        signals: mpsc::UnboundedReceiver<TransportSignal>,
    ) -> Self {
        Self {
            link: Box::new(link),
            signals,
        }
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("open", &self.link.is_open())
            .finish_non_exhaustive()
    }
}

/// Opens sockets.
///
/// `open` returns immediately; the handshake completes in the background and
/// is reported through the handle's signals. An `Err` means the socket could
/// not even be constructed.
pub trait TransportFactory: Send + Sync {
    fn open(&self, url: &Url) -> Result<TransportHandle, TransportError>;
}
