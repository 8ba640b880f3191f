//! Session scenarios against the scripted mock transport, on a paused clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use holdem_shared::{ClientMessage, PlayerActionKind};
use tokio::time::{sleep, Instant};

use super::{SessionClient, SessionSnapshot};
use crate::infrastructure::config::SessionConfig;
use crate::infrastructure::messaging::ConnectionState;
use crate::infrastructure::testing::{
    FixedClock, GameStateCall, MockTransportFactory, OpenBehavior, RecordingGameState,
    RecordingNotices,
};
use crate::ports::outbound::{
    EventKind, NoticeLevel, SessionError, SessionEvent, TransportError,
};

struct Harness {
    client: SessionClient,
    transport: MockTransportFactory,
    notices: Arc<RecordingNotices>,
    game_state: Arc<RecordingGameState>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl Harness {
    fn new(transport: MockTransportFactory) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    fn with_config(transport: MockTransportFactory, config: SessionConfig) -> Self {
        let notices = Arc::new(RecordingNotices::new());
        let game_state = Arc::new(RecordingGameState::new());
        let client = SessionClient::builder(config)
            .transport(transport.clone())
            .clock(Arc::new(FixedClock::at_millis(1_700_000_000_000)))
            .notices(notices.clone())
            .game_state(game_state.clone())
            .build();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        client.on_any(move |event| sink.lock().unwrap().push(event.clone()));

        Self {
            client,
            transport,
            notices,
            game_state,
            events,
        }
    }

    async fn snapshot(&self) -> SessionSnapshot {
        self.client.snapshot().await.unwrap()
    }

    fn kinds(&self) -> Vec<EventKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(SessionEvent::kind)
            .collect()
    }

    fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    /// Start `connect` in the background and wait until the attempt is in flight.
    async fn connect_in_background(&self) -> tokio::task::JoinHandle<Result<(), SessionError>> {
        let client = self.client.clone();
        let task = tokio::spawn(async move { client.connect("token").await });
        while self.client.state() != ConnectionState::Connecting {
            tokio::task::yield_now().await;
        }
        task
    }
}

fn gaps(times: &[Instant]) -> Vec<u128> {
    times
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).as_millis())
        .collect()
}

fn frame(message: ClientMessage) -> String {
    message.encode().unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_connect_opens_socket_and_announces() {
    let harness = Harness::new(MockTransportFactory::new());

    harness.client.connect("tok en").await.unwrap();

    assert!(harness.client.is_connected());
    let opens = harness.transport.opens();
    assert_eq!(opens.len(), 1);
    assert_eq!(opens[0].url.as_str(), "ws://localhost:8080/ws?token=tok+en");

    assert_eq!(harness.kinds(), vec![EventKind::Connected]);
    assert_eq!(harness.game_state.connected(), Some(true));
    let notices = harness.notices.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, "Connected to game server");
    assert_eq!(notices[0].level, NoticeLevel::Positive);
    assert_eq!(notices[0].timeout_ms, 2_000);

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Open);
    assert!(snapshot.heartbeat_running);
    assert!(!snapshot.backoff_pending);
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_open_is_a_no_op() {
    let harness = Harness::new(MockTransportFactory::new());

    harness.client.connect("token").await.unwrap();
    harness.client.connect("other").await.unwrap();

    assert_eq!(harness.transport.open_count(), 1);
    assert_eq!(harness.count(EventKind::Connected), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_while_open_writes_immediately() {
    let harness = Harness::new(MockTransportFactory::new());
    harness.client.connect("token").await.unwrap();

    assert!(harness.client.join_room(7).await);

    let link = harness.transport.last_link().unwrap();
    assert_eq!(link.sent(), vec![r#"{"type":"join_room","payload":{"room_id":7}}"#]);
}

#[tokio::test(start_paused = true)]
async fn test_zero_heartbeat_interval_keeps_session_alive() {
    let config = SessionConfig {
        heartbeat_interval: Duration::ZERO,
        ..SessionConfig::default()
    };
    let harness = Harness::with_config(MockTransportFactory::new(), config);

    harness.client.connect("token").await.unwrap();
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Open);
    assert!(!snapshot.heartbeat_running);

    sleep(Duration::from_secs(60)).await;
    assert!(harness.client.join_room(7).await);
    let link = harness.transport.last_link().unwrap();
    assert_eq!(link.sent(), vec![r#"{"type":"join_room","payload":{"room_id":7}}"#]);
}

#[tokio::test(start_paused = true)]
async fn test_send_before_connect_is_queued() {
    let harness = Harness::new(MockTransportFactory::new());

    assert!(!harness.client.join_room(1).await);
    assert!(!harness.client.leave_room().await);
    assert_eq!(harness.snapshot().await.queued, 2);

    harness.client.connect("token").await.unwrap();

    let link = harness.transport.last_link().unwrap();
    assert_eq!(
        link.sent(),
        vec![
            frame(ClientMessage::JoinRoom { room_id: 1 }),
            frame(ClientMessage::LeaveRoom {}),
        ]
    );
    assert_eq!(harness.snapshot().await.queued, 0);
}

#[tokio::test(start_paused = true)]
async fn test_join_queued_while_connecting_goes_out_before_first_heartbeat() {
    let transport = MockTransportFactory::new().script([OpenBehavior::Pending]);
    let harness = Harness::new(transport);

    let connecting = harness.connect_in_background().await;
    assert!(!harness.client.join_room(7).await);

    let link = harness.transport.last_link().unwrap();
    link.accept();
    connecting.await.unwrap().unwrap();

    sleep(Duration::from_secs(31)).await;

    assert_eq!(
        link.sent(),
        vec![
            r#"{"type":"join_room","payload":{"room_id":7}}"#.to_string(),
            r#"{"type":"heartbeat","payload":{"timestamp":1700000000000}}"#.to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_refused_write_keeps_queue_order() {
    let transport = MockTransportFactory::new().script([OpenBehavior::Pending]);
    let harness = Harness::new(transport);

    let connecting = harness.connect_in_background().await;
    harness.client.join_room(1).await;
    harness.client.join_room(2).await;
    harness.client.leave_room().await;

    let link = harness.transport.last_link().unwrap();
    link.set_write_budget(Some(1));
    link.accept();
    connecting.await.unwrap().unwrap();

    assert_eq!(harness.snapshot().await.queued, 2);
    assert_eq!(link.sent(), vec![frame(ClientMessage::JoinRoom { room_id: 1 })]);

    // Still blocked: the new frame waits behind the older ones
    assert!(
        !harness
            .client
            .player_action(PlayerActionKind::Raise, Some(40))
            .await
    );
    assert_eq!(harness.snapshot().await.queued, 3);

    link.set_write_budget(None);
    assert!(
        harness
            .client
            .player_action(PlayerActionKind::Fold, None)
            .await
    );
    assert_eq!(
        link.sent(),
        vec![
            frame(ClientMessage::JoinRoom { room_id: 1 }),
            frame(ClientMessage::JoinRoom { room_id: 2 }),
            frame(ClientMessage::LeaveRoom {}),
            frame(ClientMessage::PlayerAction {
                action: PlayerActionKind::Raise,
                amount: Some(40),
            }),
            frame(ClientMessage::PlayerAction {
                action: PlayerActionKind::Fold,
                amount: None,
            }),
        ]
    );
    assert_eq!(harness.snapshot().await.queued, 0);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_every_interval_with_clock_timestamp() {
    let harness = Harness::new(MockTransportFactory::new());
    harness.client.connect("token").await.unwrap();
    let link = harness.transport.last_link().unwrap();

    sleep(Duration::from_secs(29)).await;
    assert!(link.sent().is_empty());

    sleep(Duration::from_secs(32)).await;
    let heartbeat = frame(ClientMessage::Heartbeat {
        timestamp: 1_700_000_000_000,
    });
    assert_eq!(link.sent(), vec![heartbeat.clone(), heartbeat]);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_delays_double_until_exhausted() {
    let harness = Harness::new(MockTransportFactory::with_default(OpenBehavior::Fail));

    let result = harness.client.connect("token").await;
    assert!(matches!(
        result,
        Err(SessionError::Transport(TransportError::Socket(_)))
    ));

    sleep(Duration::from_secs(60)).await;

    let times = harness.transport.open_times();
    assert_eq!(times.len(), 6);
    assert_eq!(gaps(&times), vec![1_000, 2_000, 4_000, 8_000, 16_000]);

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Exhausted);
    assert_eq!(snapshot.attempts, 5);
    assert!(!snapshot.backoff_pending);
    assert!(!snapshot.credential_held);

    assert_eq!(harness.count(EventKind::ReconnectExhausted), 1);
    assert!(harness.events.lock().unwrap().contains(&SessionEvent::ReconnectExhausted { attempts: 5 }));
    assert_eq!(
        harness.notices.messages(),
        vec!["Connection lost, please refresh and retry"]
    );

    // Nothing more without an explicit connect
    sleep(Duration::from_secs(300)).await;
    assert_eq!(harness.transport.open_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_connect_after_exhaustion_starts_over() {
    let harness = Harness::new(MockTransportFactory::with_default(OpenBehavior::Fail));
    let _ = harness.client.connect("token").await;
    sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.client.state(), ConnectionState::Exhausted);

    harness.transport.set_default(OpenBehavior::Open);
    harness.client.connect("token").await.unwrap();

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Open);
    assert_eq!(snapshot.attempts, 0);
    assert!(snapshot.credential_held);
}

#[tokio::test(start_paused = true)]
async fn test_server_close_triggers_reconnect_and_resets_counter() {
    let harness = Harness::new(MockTransportFactory::new());
    harness.client.connect("token").await.unwrap();

    let first = harness.transport.last_link().unwrap();
    let dropped_at = Instant::now();
    first.drop_connection(1006, "going away");

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Recovering);
    assert_eq!(snapshot.attempts, 1);
    assert!(snapshot.backoff_pending);
    assert!(!snapshot.heartbeat_running);
    assert_eq!(harness.game_state.connected(), Some(false));

    sleep(Duration::from_millis(1_500)).await;

    let times = harness.transport.open_times();
    assert_eq!(times.len(), 2);
    assert_eq!((times[1] - dropped_at).as_millis(), 1_000);

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Open);
    assert_eq!(snapshot.attempts, 0);
    assert_eq!(
        harness.kinds(),
        vec![EventKind::Connected, EventKind::Closed, EventKind::Connected]
    );
}

#[tokio::test(start_paused = true)]
async fn test_first_attempt_refused_rejects_but_keeps_retrying() {
    let transport = MockTransportFactory::new().script([OpenBehavior::Refuse]);
    let harness = Harness::new(transport);

    let result = harness.client.connect("token").await;
    assert!(matches!(
        result,
        Err(SessionError::Transport(TransportError::Open(_)))
    ));
    assert_eq!(harness.client.state(), ConnectionState::Recovering);

    sleep(Duration::from_millis(1_500)).await;

    assert_eq!(harness.transport.open_count(), 2);
    assert!(harness.client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_counts_as_failed_attempt() {
    let transport = MockTransportFactory::new().script([OpenBehavior::Pending]);
    let harness = Harness::new(transport);

    let result = harness.client.connect("token").await;
    assert_eq!(
        result,
        Err(SessionError::ConnectTimeout(Duration::from_secs(10)))
    );
    assert_eq!(harness.client.state(), ConnectionState::Recovering);

    let stalled = harness.transport.link(0).unwrap();
    assert_eq!(stalled.closed_with(), Some((1000, "Connect timeout".to_string())));

    sleep(Duration::from_millis(1_500)).await;

    let times = harness.transport.open_times();
    assert_eq!(gaps(&times), vec![11_000]);
    assert!(harness.client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_all_timers() {
    let harness = Harness::new(MockTransportFactory::new());
    harness.client.connect("token").await.unwrap();
    let link = harness.transport.last_link().unwrap();

    harness.client.disconnect().await;

    assert_eq!(
        link.closed_with(),
        Some((1000, "Manual disconnect".to_string()))
    );
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::ManuallyClosed);
    assert!(!snapshot.heartbeat_running);
    assert!(!snapshot.backoff_pending);
    assert_eq!(harness.game_state.connected(), Some(false));
    assert_eq!(
        harness.events.lock().unwrap().last(),
        Some(&SessionEvent::Closed {
            code: 1000,
            reason: "Manual disconnect".to_string()
        })
    );

    sleep(Duration::from_secs(120)).await;

    assert_eq!(harness.transport.open_count(), 1);
    assert!(link.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_backoff_cancels_reconnect() {
    let harness = Harness::new(MockTransportFactory::new());
    harness.client.connect("token").await.unwrap();
    harness
        .transport
        .last_link()
        .unwrap()
        .drop_connection(1011, "server restart");
    assert!(harness.snapshot().await.backoff_pending);

    harness.client.disconnect().await;
    sleep(Duration::from_secs(120)).await;

    assert_eq!(harness.transport.open_count(), 1);
    assert_eq!(harness.client.state(), ConnectionState::ManuallyClosed);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connecting_cancels_connect() {
    let transport = MockTransportFactory::new().script([OpenBehavior::Pending]);
    let harness = Harness::new(transport);

    let connecting = harness.connect_in_background().await;
    harness.client.disconnect().await;

    assert_eq!(connecting.await.unwrap(), Err(SessionError::Cancelled));
    sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.transport.open_count(), 1);
    assert_eq!(harness.client.state(), ConnectionState::ManuallyClosed);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_keeps_queued_frames_for_next_connect() {
    let harness = Harness::new(MockTransportFactory::new());
    harness.client.join_room(3).await;
    harness.client.disconnect().await;
    assert_eq!(harness.snapshot().await.queued, 1);

    harness.client.connect("token").await.unwrap();

    let link = harness.transport.last_link().unwrap();
    assert_eq!(link.sent(), vec![frame(ClientMessage::JoinRoom { room_id: 3 })]);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_leaves_connection_open() {
    let harness = Harness::new(MockTransportFactory::new());
    harness.client.connect("token").await.unwrap();
    let link = harness.transport.last_link().unwrap();

    link.push_frame("{not json");
    link.push_frame(r#"{"payload":{}}"#);

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Open);
    assert_eq!(link.closed_with(), None);
    assert_eq!(harness.kinds(), vec![EventKind::Connected]);
}

#[tokio::test(start_paused = true)]
async fn test_inbound_frames_reach_collaborators() {
    let harness = Harness::new(MockTransportFactory::new());
    harness.client.connect("token").await.unwrap();
    let link = harness.transport.last_link().unwrap();

    link.push_frame(r#"{"type":"room_update","payload":{"seats":9}}"#);
    link.push_frame(r#"{"type":"player_action","payload":{"player_name":"bob","action":"raise"}}"#);
    harness.snapshot().await;

    assert_eq!(
        harness.game_state.calls(),
        vec![
            GameStateCall::Connected(true),
            GameStateCall::Room(serde_json::json!({ "seats": 9 })),
        ]
    );
    assert_eq!(
        harness.notices.messages(),
        vec!["Connected to game server", "bob raises"]
    );
    assert_eq!(
        harness.kinds(),
        vec![
            EventKind::Connected,
            EventKind::RoomUpdate,
            EventKind::Message,
            EventKind::PlayerAction,
            EventKind::Message,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_panicking_subscriber_does_not_break_session() {
    let harness = Harness::new(MockTransportFactory::new());
    harness
        .client
        .on(EventKind::Connected, |_event| panic!("bad subscriber"));

    harness.client.connect("token").await.unwrap();

    assert!(harness.client.is_connected());
    assert_eq!(harness.count(EventKind::Connected), 1);
}

#[tokio::test(start_paused = true)]
async fn test_silent_peer_is_dropped_after_ack_timeout() {
    let config = SessionConfig {
        heartbeat_ack_timeout: Some(Duration::from_secs(45)),
        ..SessionConfig::default()
    };
    let harness = Harness::with_config(MockTransportFactory::new(), config);
    harness.client.connect("token").await.unwrap();
    let first = harness.transport.last_link().unwrap();

    sleep(Duration::from_secs(31)).await;
    assert_eq!(first.sent().len(), 1);

    // Second tick at 60 s finds 60 s of silence; reconnect follows 1 s later
    sleep(Duration::from_secs(31)).await;

    assert_eq!(
        first.closed_with(),
        Some((4000, "Heartbeat timeout".to_string()))
    );
    assert_eq!(harness.transport.open_count(), 2);
    assert!(harness.client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_last_handle_closes_socket() {
    let harness = Harness::new(MockTransportFactory::new());
    harness.client.connect("token").await.unwrap();
    let link = harness.transport.last_link().unwrap();

    let Harness { client, .. } = harness;
    drop(client);
    sleep(Duration::from_millis(10)).await;

    assert_eq!(link.closed_with(), Some((1000, "Client dropped".to_string())));
}
