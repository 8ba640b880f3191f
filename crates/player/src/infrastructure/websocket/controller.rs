//! Session controller - the single task that owns the connection.
//!
//! Every piece of mutable session state lives here: the socket, the outbound
//! queue, the backoff counter and all three timers. Transport signals, caller
//! commands and timer expiries are handled one at a time from one `select!`
//! loop, so no two transitions ever interleave.

use std::future::pending;
use std::pin::Pin;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Instant, Sleep};

use holdem_shared::ClientMessage;

use super::client::{Credential, SessionSnapshot};
use super::core::{BackoffState, HeartbeatMonitor, OutboundQueue};
use super::inbound::InboundRouter;
use super::shared::{
    endpoint_url, CLOSE_ABNORMAL, CLOSE_NORMAL, CLOSE_UNRESPONSIVE, MANUAL_CLOSE_REASON,
};
use super::transport::{TransportFactory, TransportHandle, TransportSignal};
use crate::infrastructure::config::SessionConfig;
use crate::infrastructure::messaging::{set_connection_state, ConnectionState, EventBus};
use crate::ports::outbound::{
    ClockPort, GameStatePort, Notice, NoticeLevel, NoticePort, NoticePosition, SessionError,
    SessionEvent, TransportError,
};

const CONNECTED_NOTICE: &str = "Connected to game server";
const CONNECTED_NOTICE_MS: u64 = 2_000;
const EXHAUSTED_NOTICE: &str = "Connection lost, please refresh and retry";
const EXHAUSTED_NOTICE_MS: u64 = 5_000;

const CONNECT_TIMEOUT_REASON: &str = "Connect timeout";
const UNRESPONSIVE_REASON: &str = "Heartbeat timeout";
const CLIENT_DROPPED_REASON: &str = "Client dropped";

/// Requests from [`SessionClient`](super::client::SessionClient) handles.
pub(crate) enum Command {
    Connect {
        credential: Credential,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Send {
        frame: String,
        reply: oneshot::Sender<bool>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Collaborators injected at build time.
pub(crate) struct ControllerDeps {
    pub transport: Arc<dyn TransportFactory>,
    pub clock: Arc<dyn ClockPort>,
    pub notices: Arc<dyn NoticePort>,
    pub game_state: Arc<dyn GameStatePort>,
    pub events: EventBus,
    pub state: Arc<AtomicU8>,
}

pub(crate) struct SessionController {
    config: SessionConfig,
    transport: Arc<dyn TransportFactory>,
    clock: Arc<dyn ClockPort>,
    notices: Arc<dyn NoticePort>,
    game_state: Arc<dyn GameStatePort>,
    events: EventBus,
    state: Arc<AtomicU8>,
    current: ConnectionState,

    backoff: BackoffState,
    queue: OutboundQueue,
    heartbeat: HeartbeatMonitor,
    link: Option<TransportHandle>,

    credential: Option<Credential>,
    manual_close: bool,
    pending_connect: Option<oneshot::Sender<Result<(), SessionError>>>,
    /// Error reported by the socket before it closed during the handshake
    attempt_error: Option<SessionError>,
    connect_deadline: Option<Pin<Box<Sleep>>>,
    backoff_timer: Option<Pin<Box<Sleep>>>,
    last_inbound: Instant,
}

impl SessionController {
    pub(crate) fn new(config: SessionConfig, deps: ControllerDeps) -> Self {
        let backoff = BackoffState::new(config.reconnect);
        let queue = OutboundQueue::new(config.queue_capacity, config.overflow);
        set_connection_state(&deps.state, ConnectionState::Idle);

        Self {
            config,
            transport: deps.transport,
            clock: deps.clock,
            notices: deps.notices,
            game_state: deps.game_state,
            events: deps.events,
            state: deps.state,
            current: ConnectionState::Idle,
            backoff,
            queue,
            heartbeat: HeartbeatMonitor::new(),
            link: None,
            credential: None,
            manual_close: false,
            pending_connect: None,
            attempt_error: None,
            connect_deadline: None,
            backoff_timer: None,
            last_inbound: Instant::now(),
        }
    }

    /// Drive the session until every client handle is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                biased;

                signal = next_signal(&mut self.link) => self.on_signal(signal),

                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },

                () = sleep_or_pending(&mut self.connect_deadline) => self.on_connect_timeout(),

                () = sleep_or_pending(&mut self.backoff_timer) => self.on_backoff_elapsed(),

                () = self.heartbeat.tick() => self.on_heartbeat_tick(),
            }
        }

        self.shutdown();
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect { credential, reply } => self.on_connect(credential, reply),
            Command::Send { frame, reply } => {
                let _ = reply.send(self.on_send(frame));
            }
            Command::Disconnect { reply } => {
                self.on_disconnect();
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn on_connect(
        &mut self,
        credential: Credential,
        reply: oneshot::Sender<Result<(), SessionError>>,
    ) {
        if self.current.is_active() {
            tracing::debug!(state = ?self.current, "Connect ignored, already connecting or open");
            let _ = reply.send(Ok(()));
            return;
        }

        self.credential = Some(credential);
        self.manual_close = false;
        if self.current == ConnectionState::Exhausted {
            self.backoff.reset();
        }
        self.backoff_timer = None;
        self.pending_connect = Some(reply);
        self.start_attempt();
    }

    /// Write now if open and nothing is waiting ahead, otherwise queue.
    fn on_send(&mut self, frame: String) -> bool {
        if self.current == ConnectionState::Open {
            self.flush_queue();
            if self.queue.is_empty() {
                if let Some(handle) = self.link.as_mut() {
                    if handle.link.send(&frame) {
                        return true;
                    }
                }
            }
        }

        let dropped_before = self.queue.dropped();
        self.queue.enqueue(frame);
        if self.queue.dropped() > dropped_before {
            tracing::warn!(
                capacity = ?self.config.queue_capacity,
                policy = ?self.config.overflow,
                "Outbound queue full, frame dropped"
            );
        }
        tracing::debug!(queued = self.queue.len(), "Queued outbound frame");
        false
    }

    fn on_disconnect(&mut self) {
        self.backoff_timer = None;
        self.heartbeat.stop();
        self.manual_close = true;
        self.connect_deadline = None;

        let had_link = match self.link.take() {
            Some(mut handle) => {
                handle.link.close(CLOSE_NORMAL, MANUAL_CLOSE_REASON);
                true
            }
            None => false,
        };

        self.backoff.reset();
        self.attempt_error = None;
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(SessionError::Cancelled));
        }
        self.credential = None;

        self.set_state(ConnectionState::ManuallyClosed);
        self.game_state.set_connected(false);
        if had_link {
            self.events.emit(&SessionEvent::Closed {
                code: CLOSE_NORMAL,
                reason: MANUAL_CLOSE_REASON.to_string(),
            });
        }
        tracing::info!(queued = self.queue.len(), "Disconnected from game server");
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.current,
            attempts: self.backoff.attempts(),
            queued: self.queue.len(),
            heartbeat_running: self.heartbeat.is_running(),
            backoff_pending: self.backoff_timer.is_some(),
            credential_held: self.credential.is_some(),
        }
    }

    // =========================================================================
    // Connection attempts
    // =========================================================================

    fn start_attempt(&mut self) {
        let Some(credential) = self.credential.clone() else {
            return;
        };

        self.set_state(ConnectionState::Connecting);
        self.attempt_error = None;
        tracing::info!(
            server = %self.config.server_url,
            attempt = self.backoff.attempts(),
            "Connecting to game server"
        );

        let opened = endpoint_url(&self.config.server_url, credential.expose())
            .and_then(|url| self.transport.open(&url));

        match opened {
            Ok(handle) => {
                self.link = Some(handle);
                self.connect_deadline = Some(Box::pin(sleep(self.config.connect_timeout)));
            }
            Err(e) => {
                let error = SessionError::Transport(e);
                tracing::warn!(error = %error, "Failed to open socket");
                self.events.emit(&SessionEvent::Error(error.clone()));
                self.on_link_down(error);
            }
        }
    }

    fn on_signal(&mut self, signal: Option<TransportSignal>) {
        match signal {
            Some(TransportSignal::Opened) => self.on_opened(),
            Some(TransportSignal::Frame(text)) => self.on_frame(&text),
            Some(TransportSignal::Errored(message)) => self.on_errored(message),
            Some(TransportSignal::Closed { code, reason }) => self.on_closed(code, reason),
            // The socket went away without saying goodbye
            None => self.on_closed(CLOSE_ABNORMAL, String::new()),
        }
    }

    fn on_opened(&mut self) {
        if self.current != ConnectionState::Connecting {
            tracing::debug!(state = ?self.current, "Ignoring late open");
            return;
        }

        self.connect_deadline = None;
        self.backoff.reset();
        self.set_state(ConnectionState::Open);
        self.heartbeat.start(self.config.heartbeat_interval);

        let flushed = self.flush_queue();
        self.last_inbound = Instant::now();
        tracing::info!(flushed, queued = self.queue.len(), "Connected to game server");

        self.game_state.set_connected(true);
        self.events.emit(&SessionEvent::Connected);
        self.notices.notify(Notice::new(
            NoticeLevel::Positive,
            CONNECTED_NOTICE,
            CONNECTED_NOTICE_MS,
            NoticePosition::Top,
        ));

        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Ok(()));
        }
    }

    fn on_frame(&mut self, text: &str) {
        self.last_inbound = Instant::now();
        let router = InboundRouter {
            game_state: self.game_state.as_ref(),
            notices: self.notices.as_ref(),
            events: &self.events,
        };
        router.route(text);
    }

    fn on_errored(&mut self, message: String) {
        let error = SessionError::Transport(TransportError::Socket(message));
        tracing::warn!(state = ?self.current, error = %error, "Socket error");
        self.events.emit(&SessionEvent::Error(error.clone()));

        if self.current == ConnectionState::Connecting {
            self.attempt_error = Some(error);
        }
    }

    fn on_closed(&mut self, code: u16, reason: String) {
        tracing::info!(code, reason = %reason, state = ?self.current, "Socket closed");
        self.events.emit(&SessionEvent::Closed {
            code,
            reason: reason.clone(),
        });

        let failure = match self.attempt_error.take() {
            Some(error) if self.current == ConnectionState::Connecting => error,
            _ if self.current == ConnectionState::Connecting => {
                TransportError::ClosedDuringHandshake { code, reason }.into()
            }
            _ => TransportError::socket(format!("connection closed with code {code}")).into(),
        };
        self.on_link_down(failure);
    }

    fn on_connect_timeout(&mut self) {
        self.connect_deadline = None;
        if self.current != ConnectionState::Connecting {
            return;
        }

        let error = SessionError::ConnectTimeout(self.config.connect_timeout);
        tracing::warn!(error = %error, "Connection attempt timed out");
        if let Some(handle) = self.link.as_mut() {
            handle.link.close(CLOSE_NORMAL, CONNECT_TIMEOUT_REASON);
        }
        self.events.emit(&SessionEvent::Error(error.clone()));
        self.on_link_down(error);
    }

    /// The socket is gone; either schedule the next attempt or give up.
    fn on_link_down(&mut self, failure: SessionError) {
        tracing::debug!(
            error = %failure,
            recoverable = failure.is_recoverable(),
            "Link down"
        );
        self.connect_deadline = None;
        self.heartbeat.stop();
        self.link = None;
        self.attempt_error = None;
        self.game_state.set_connected(false);

        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(failure));
        }

        if self.manual_close {
            self.set_state(ConnectionState::ManuallyClosed);
            return;
        }
        if self.credential.is_none() {
            self.set_state(ConnectionState::Idle);
            return;
        }

        match self.backoff.next_delay_and_advance() {
            Some(delay) => {
                tracing::info!(
                    attempt = self.backoff.attempts(),
                    max_attempts = self.backoff.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                self.set_state(ConnectionState::Recovering);
                self.backoff_timer = Some(Box::pin(sleep(delay)));
            }
            None => {
                let attempts = self.backoff.attempts();
                tracing::error!(attempts, "Reconnection attempts exhausted, giving up");
                self.credential = None;
                self.set_state(ConnectionState::Exhausted);
                self.events
                    .emit(&SessionEvent::ReconnectExhausted { attempts });
                self.notices.notify(Notice::new(
                    NoticeLevel::Negative,
                    EXHAUSTED_NOTICE,
                    EXHAUSTED_NOTICE_MS,
                    NoticePosition::Top,
                ));
            }
        }
    }

    fn on_backoff_elapsed(&mut self) {
        self.backoff_timer = None;
        if self.manual_close || self.credential.is_none() {
            tracing::debug!("Backoff elapsed after disconnect, not reconnecting");
            return;
        }

        tracing::info!(
            attempt = self.backoff.attempts(),
            max_attempts = self.backoff.max_attempts(),
            "Reconnecting"
        );
        self.start_attempt();
    }

    // =========================================================================
    // Heartbeat
    // =========================================================================

    fn on_heartbeat_tick(&mut self) {
        if self.current != ConnectionState::Open {
            self.heartbeat.stop();
            return;
        }

        if let Some(limit) = self.config.heartbeat_ack_timeout {
            let silent_for = self.last_inbound.elapsed();
            if silent_for > limit {
                self.on_unresponsive(silent_for);
                return;
            }
        }

        let heartbeat = ClientMessage::Heartbeat {
            timestamp: self.clock.now().timestamp_millis(),
        };
        let frame = match heartbeat.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode heartbeat");
                return;
            }
        };

        let sent = self
            .link
            .as_mut()
            .is_some_and(|handle| handle.link.send(&frame));
        if !sent {
            tracing::debug!("Socket not writable, skipping heartbeat");
        }
    }

    fn on_unresponsive(&mut self, silent_for: std::time::Duration) {
        let error = SessionError::Transport(TransportError::Unresponsive(silent_for));
        tracing::warn!(error = %error, "Peer unresponsive, dropping connection");

        if let Some(handle) = self.link.as_mut() {
            handle.link.close(CLOSE_UNRESPONSIVE, UNRESPONSIVE_REASON);
        }
        self.events.emit(&SessionEvent::Error(error.clone()));
        self.events.emit(&SessionEvent::Closed {
            code: CLOSE_UNRESPONSIVE,
            reason: UNRESPONSIVE_REASON.to_string(),
        });
        self.on_link_down(error);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn flush_queue(&mut self) -> usize {
        let Some(handle) = self.link.as_mut() else {
            return 0;
        };
        let sent = self.queue.drain_to(|frame| handle.link.send(frame));
        if !self.queue.is_empty() {
            tracing::debug!(sent, queued = self.queue.len(), "Socket refused a queued frame");
        }
        sent
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.current != next {
            tracing::debug!(from = ?self.current, to = ?next, "Connection state changed");
        }
        self.current = next;
        set_connection_state(&self.state, next);
    }

    fn shutdown(&mut self) {
        self.backoff_timer = None;
        self.connect_deadline = None;
        self.heartbeat.stop();
        if let Some(mut handle) = self.link.take() {
            handle.link.close(CLOSE_NORMAL, CLIENT_DROPPED_REASON);
        }
        if self.current != ConnectionState::Idle {
            self.set_state(ConnectionState::ManuallyClosed);
        }
        tracing::debug!(dropped = self.queue.len(), "Session controller stopped");
    }
}

async fn next_signal(link: &mut Option<TransportHandle>) -> Option<TransportSignal> {
    match link {
        Some(handle) => handle.signals.recv().await,
        None => pending().await,
    }
}

async fn sleep_or_pending(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
