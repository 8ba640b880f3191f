//! Session client - the caller-facing handle to one game-server session.
//!
//! Built with [`SessionClient::builder`], which spawns the controller task.
//! Handles are cheap to clone; the controller stops once the last one is
//! dropped.

use std::fmt;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use holdem_shared::{ClientMessage, PlayerActionKind};

use super::controller::{Command, ControllerDeps, SessionController};
use super::desktop::WsTransportFactory;
use super::transport::TransportFactory;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::config::SessionConfig;
use crate::infrastructure::messaging::{
    ConnectionState, ConnectionStateObserver, EventBus, SubscriptionId,
};
use crate::ports::outbound::{
    ClockPort, DetachedGameState, EventKind, GameStatePort, NoticePort, SessionError,
    SessionEvent, TracingNotices,
};

/// Command channel depth between handles and the controller.
const COMMAND_BUFFER: usize = 64;

/// Opaque session token sent to the server when connecting.
///
/// Never printed: `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Point-in-time view of the controller's internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    /// Reconnect attempts since the last successful open
    pub attempts: u32,
    /// Frames waiting in the outbound queue
    pub queued: usize,
    pub heartbeat_running: bool,
    pub backoff_pending: bool,
    /// A credential is kept for the running connect/reconnect sequence
    pub credential_held: bool,
}

/// Builder for [`SessionClient`].
///
/// Every collaborator has a headless default: the tokio-tungstenite
/// transport, the system clock, notices written to the log and no game-state
/// store.
pub struct SessionClientBuilder {
    config: SessionConfig,
    transport: Arc<dyn TransportFactory>,
    clock: Arc<dyn ClockPort>,
    notices: Arc<dyn NoticePort>,
    game_state: Arc<dyn GameStatePort>,
}

impl SessionClientBuilder {
    pub fn transport(mut self, transport: impl TransportFactory + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn ClockPort>) -> Self {
        self.clock = clock;
        self
    }

    pub fn notices(mut self, notices: Arc<dyn NoticePort>) -> Self {
        self.notices = notices;
        self
    }

    pub fn game_state(mut self, game_state: Arc<dyn GameStatePort>) -> Self {
        self.game_state = game_state;
        self
    }

    /// Spawn the controller on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn build(self) -> SessionClient {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let events = EventBus::new();
        let state = Arc::new(AtomicU8::new(ConnectionState::Idle.to_u8()));

        let controller = SessionController::new(
            self.config,
            ControllerDeps {
                transport: self.transport,
                clock: self.clock,
                notices: self.notices,
                game_state: self.game_state,
                events: events.clone(),
                state: Arc::clone(&state),
            },
        );
        tokio::spawn(controller.run(commands_rx));

        SessionClient {
            commands: commands_tx,
            events,
            observer: ConnectionStateObserver::new(state),
        }
    }
}

/// Handle to a game-server session.
#[derive(Clone)]
pub struct SessionClient {
    commands: mpsc::Sender<Command>,
    events: EventBus,
    observer: ConnectionStateObserver,
}

impl SessionClient {
    pub fn builder(config: SessionConfig) -> SessionClientBuilder {
        SessionClientBuilder {
            config,
            transport: Arc::new(WsTransportFactory::new()),
            clock: Arc::new(SystemClock::new()),
            notices: Arc::new(TracingNotices),
            game_state: Arc::new(DetachedGameState),
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| SessionError::ClientGone)?;
        reply_rx.await.map_err(|_| SessionError::ClientGone)
    }

    /// Open the session.
    ///
    /// Resolves once the socket opens. If this attempt fails the error is
    /// returned, but reconnection still continues in the background. A no-op
    /// while already connecting or open.
    pub async fn connect(&self, credential: impl Into<Credential>) -> Result<(), SessionError> {
        let credential = credential.into();
        self.request(|reply| Command::Connect { credential, reply })
            .await?
    }

    /// Send one message.
    ///
    /// Returns true if it was written to the socket now, false if it was
    /// queued for the next open (or could not be encoded).
    pub async fn send(&self, message: &ClientMessage) -> bool {
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(kind = message.kind(), error = %e, "Failed to encode message");
                return false;
            }
        };

        match self.request(|reply| Command::Send { frame, reply }).await {
            Ok(sent) => sent,
            Err(e) => {
                tracing::warn!(kind = message.kind(), error = %e, "Message not sent");
                false
            }
        }
    }

    /// Close the session and stop reconnecting. Queued frames are kept.
    pub async fn disconnect(&self) {
        if let Err(e) = self.request(|reply| Command::Disconnect { reply }).await {
            tracing::debug!(error = %e, "Disconnect after controller stopped");
        }
    }

    pub async fn join_room(&self, room_id: u64) -> bool {
        self.send(&ClientMessage::JoinRoom { room_id }).await
    }

    pub async fn leave_room(&self) -> bool {
        self.send(&ClientMessage::LeaveRoom {}).await
    }

    pub async fn player_action(&self, action: PlayerActionKind, amount: Option<u64>) -> bool {
        self.send(&ClientMessage::PlayerAction { action, amount })
            .await
    }

    pub fn on(
        &self,
        kind: EventKind,
        callback: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.on(kind, callback)
    }

    pub fn on_any(
        &self,
        callback: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.on_any(callback)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.events.off(id)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn state(&self) -> ConnectionState {
        self.observer.state()
    }

    pub fn is_connected(&self) -> bool {
        self.observer.is_connected()
    }

    pub fn observer(&self) -> ConnectionStateObserver {
        self.observer.clone()
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}
