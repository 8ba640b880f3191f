//! Socket transport backed by tokio-tungstenite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::infrastructure::websocket::shared::{CLOSE_ABNORMAL, CLOSE_NO_STATUS};
use crate::infrastructure::websocket::transport::{
    Transport, TransportFactory, TransportHandle, TransportSignal,
};
use crate::ports::outbound::TransportError;

enum Outgoing {
    Text(String),
    Close { code: u16, reason: String },
}

/// Opens one tokio-tungstenite socket per attempt, each driven by its own task.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransportFactory;

impl WsTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

impl TransportFactory for WsTransportFactory {
    fn open(&self, url: &Url) -> Result<TransportHandle, TransportError> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidUrl(format!(
                "socket URL must use ws or wss: {url}"
            )));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(TransportError::open)?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        runtime.spawn(run_socket(
            url.clone(),
            outgoing_rx,
            signal_tx,
            Arc::clone(&open),
        ));

        let link = WsLink {
            outgoing: outgoing_tx,
            open,
            closing: false,
        };
        Ok(TransportHandle::new(link, signal_rx))
    }
}

struct WsLink {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    open: Arc<AtomicBool>,
    closing: bool,
}

impl Transport for WsLink {
    fn send(&mut self, frame: &str) -> bool {
        if !self.is_open() {
            return false;
        }
        self.outgoing
            .send(Outgoing::Text(frame.to_string()))
            .is_ok()
    }

    fn close(&mut self, code: u16, reason: &str) {
        if self.closing {
            return;
        }
        self.closing = true;
        let _ = self.outgoing.send(Outgoing::Close {
            code,
            reason: reason.to_string(),
        });
    }

    fn is_open(&self) -> bool {
        !self.closing && self.open.load(Ordering::SeqCst)
    }
}

/// Drive one socket from handshake to close.
///
/// Ends early, without a `Closed` signal, when the link is dropped during the
/// handshake: nobody is listening any more.
async fn run_socket(
    url: Url,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    signals: mpsc::UnboundedSender<TransportSignal>,
    open: Arc<AtomicBool>,
) {
    let handshake = connect_async(url.as_str());
    tokio::pin!(handshake);

    let stream = loop {
        tokio::select! {
            result = &mut handshake => match result {
                Ok((stream, _response)) => break stream,
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Socket handshake failed");
                    let _ = signals.send(TransportSignal::Errored(e.to_string()));
                    let _ = signals.send(TransportSignal::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: String::new(),
                    });
                    return;
                }
            },
            command = outgoing.recv() => match command {
                None => return,
                Some(Outgoing::Close { code, reason }) => {
                    let _ = signals.send(TransportSignal::Closed { code, reason });
                    return;
                }
                // Not writable before the handshake completes
                Some(Outgoing::Text(_)) => {}
            },
        }
    };

    open.store(true, Ordering::SeqCst);
    let _ = signals.send(TransportSignal::Opened);

    let (mut write, mut read) = stream.split();
    let closed = loop {
        tokio::select! {
            command = outgoing.recv() => match command {
                Some(Outgoing::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        let _ = signals.send(TransportSignal::Errored(e.to_string()));
                        break TransportSignal::Closed {
                            code: CLOSE_ABNORMAL,
                            reason: String::new(),
                        };
                    }
                }
                Some(Outgoing::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        tracing::debug!(error = %e, "Failed to send close frame");
                    }
                    break TransportSignal::Closed { code, reason };
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break TransportSignal::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: String::new(),
                    };
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = signals.send(TransportSignal::Frame(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => TransportSignal::Closed {
                            code: u16::from(frame.code),
                            reason: frame.reason.to_string(),
                        },
                        None => TransportSignal::Closed {
                            code: CLOSE_NO_STATUS,
                            reason: String::new(),
                        },
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = signals.send(TransportSignal::Errored(e.to_string()));
                    break TransportSignal::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: String::new(),
                    };
                }
                None => {
                    break TransportSignal::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: String::new(),
                    };
                }
            },
        }
    };

    open.store(false, Ordering::SeqCst);
    let _ = signals.send(closed);
}
