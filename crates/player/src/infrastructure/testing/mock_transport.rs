//! In-memory transport driven by a script, for session scenario tests.
//!
//! Each `open` consumes the next [`OpenBehavior`] from the script (or the
//! default once the script runs out) and records when and where it was
//! called. Tests drive the resulting socket through its [`MockLink`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use crate::infrastructure::websocket::shared::CLOSE_ABNORMAL;
use crate::infrastructure::websocket::transport::{
    Transport, TransportFactory, TransportHandle, TransportSignal,
};
use crate::ports::outbound::TransportError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How the next socket behaves after `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenBehavior {
    /// Opens immediately
    Open,
    /// `open` itself returns an error
    Refuse,
    /// Reports an error and closes with 1006 before opening
    Fail,
    /// Stays connecting until the test calls [`MockLink::accept`]
    Pending,
}

/// One call to `open`.
#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub at: Instant,
    pub url: Url,
    pub behavior: OpenBehavior,
    /// `None` when the open was refused
    pub link: Option<MockLink>,
}

struct FactoryState {
    script: VecDeque<OpenBehavior>,
    default: OpenBehavior,
    opens: Vec<OpenRecord>,
}

/// Scripted [`TransportFactory`]. Clones share the script and the records.
#[derive(Clone)]
pub struct MockTransportFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl MockTransportFactory {
    /// Every socket opens immediately.
    pub fn new() -> Self {
        Self::with_default(OpenBehavior::Open)
    }

    pub fn with_default(default: OpenBehavior) -> Self {
        Self {
            state: Arc::new(Mutex::new(FactoryState {
                script: VecDeque::new(),
                default,
                opens: Vec::new(),
            })),
        }
    }

    /// Behaviours for the next opens, in order, before falling back to the default.
    pub fn script(self, behaviors: impl IntoIterator<Item = OpenBehavior>) -> Self {
        lock(&self.state).script.extend(behaviors);
        self
    }

    pub fn set_default(&self, default: OpenBehavior) {
        lock(&self.state).default = default;
    }

    pub fn opens(&self) -> Vec<OpenRecord> {
        lock(&self.state).opens.clone()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).opens.len()
    }

    pub fn open_times(&self) -> Vec<Instant> {
        lock(&self.state).opens.iter().map(|open| open.at).collect()
    }

    /// The socket from the `n`th open (0-based), if it was not refused.
    pub fn link(&self, n: usize) -> Option<MockLink> {
        lock(&self.state).opens.get(n).and_then(|open| open.link.clone())
    }

    pub fn last_link(&self) -> Option<MockLink> {
        lock(&self.state)
            .opens
            .iter()
            .rev()
            .find_map(|open| open.link.clone())
    }
}

impl Default for MockTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for MockTransportFactory {
    fn open(&self, url: &Url) -> Result<TransportHandle, TransportError> {
        let mut state = lock(&self.state);
        let behavior = state.script.pop_front().unwrap_or(state.default);

        if behavior == OpenBehavior::Refuse {
            state.opens.push(OpenRecord {
                at: Instant::now(),
                url: url.clone(),
                behavior,
                link: None,
            });
            return Err(TransportError::open("connection refused"));
        }

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let link = MockLink {
            socket: Arc::new(Mutex::new(SocketState::default())),
            signals: signals_tx,
        };

        match behavior {
            OpenBehavior::Open => link.accept(),
            OpenBehavior::Fail => link.fail("connection refused"),
            OpenBehavior::Pending | OpenBehavior::Refuse => {}
        }

        state.opens.push(OpenRecord {
            at: Instant::now(),
            url: url.clone(),
            behavior,
            link: Some(link.clone()),
        });

        let socket = MockSocket {
            socket: Arc::clone(&link.socket),
            signals: link.signals.clone(),
        };
        Ok(TransportHandle::new(socket, signals_rx))
    }
}

#[derive(Debug, Default)]
struct SocketState {
    open: bool,
    sent: Vec<String>,
    closed_with: Option<(u16, String)>,
    write_budget: Option<usize>,
}

/// Test-side handle to one mock socket.
#[derive(Debug, Clone)]
pub struct MockLink {
    socket: Arc<Mutex<SocketState>>,
    signals: mpsc::UnboundedSender<TransportSignal>,
}

impl MockLink {
    /// Complete the handshake.
    pub fn accept(&self) {
        lock(&self.socket).open = true;
        let _ = self.signals.send(TransportSignal::Opened);
    }

    /// Report an error followed by an abnormal close.
    pub fn fail(&self, message: &str) {
        lock(&self.socket).open = false;
        let _ = self
            .signals
            .send(TransportSignal::Errored(message.to_string()));
        let _ = self.signals.send(TransportSignal::Closed {
            code: CLOSE_ABNORMAL,
            reason: String::new(),
        });
    }

    /// Deliver one inbound frame.
    pub fn push_frame(&self, frame: &str) {
        let _ = self.signals.send(TransportSignal::Frame(frame.to_string()));
    }

    /// Close from the server side.
    pub fn drop_connection(&self, code: u16, reason: &str) {
        lock(&self.socket).open = false;
        let _ = self.signals.send(TransportSignal::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    /// Frames written by the client, oldest first.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.socket).sent.clone()
    }

    /// Code and reason of a client-initiated close.
    pub fn closed_with(&self) -> Option<(u16, String)> {
        lock(&self.socket).closed_with.clone()
    }

    /// Accept only `budget` more writes; `None` lifts the limit.
    pub fn set_write_budget(&self, budget: Option<usize>) {
        lock(&self.socket).write_budget = budget;
    }

    pub fn is_open(&self) -> bool {
        lock(&self.socket).open
    }
}

struct MockSocket {
    socket: Arc<Mutex<SocketState>>,
    signals: mpsc::UnboundedSender<TransportSignal>,
}

impl Transport for MockSocket {
    fn send(&mut self, frame: &str) -> bool {
        let mut socket = lock(&self.socket);
        if !socket.open {
            return false;
        }
        match socket.write_budget {
            Some(0) => return false,
            Some(ref mut budget) => *budget -= 1,
            None => {}
        }
        socket.sent.push(frame.to_string());
        true
    }

    fn close(&mut self, code: u16, reason: &str) {
        let mut socket = lock(&self.socket);
        if socket.closed_with.is_some() {
            return;
        }
        socket.open = false;
        socket.closed_with = Some((code, reason.to_string()));
        let _ = self.signals.send(TransportSignal::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    fn is_open(&self) -> bool {
        lock(&self.socket).open
    }
}
