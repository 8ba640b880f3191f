//! Routes inbound frames to collaborators and subscribers.
//!
//! Decodes the raw text, forwards snapshots to the [`GameStatePort`], raises
//! user notices, then publishes the typed [`SessionEvent`] followed by a
//! generic [`SessionEvent::Message`]. Undecodable frames are logged and
//! dropped; they never affect the connection.

use holdem_shared::{Envelope, NotificationData, PlayerActionData, ServerMessage};

use crate::infrastructure::messaging::EventBus;
use crate::ports::outbound::{
    GameStatePort, Notice, NoticeLevel, NoticePort, NoticePosition, SessionError, SessionEvent,
};

const ERROR_FALLBACK: &str = "An error occurred";
const ERROR_NOTICE_MS: u64 = 5_000;
const PLAYER_ACTION_NOTICE_MS: u64 = 2_000;
const NOTIFICATION_DEFAULT_MS: u64 = 3_000;

/// Collaborators an inbound frame can reach.
pub struct InboundRouter<'a> {
    pub game_state: &'a dyn GameStatePort,
    pub notices: &'a dyn NoticePort,
    pub events: &'a EventBus,
}

impl InboundRouter<'_> {
    /// Handle one raw frame.
    ///
    /// Returns the decoded envelope, or `None` if the frame was dropped.
    pub fn route(&self, raw: &str) -> Option<Envelope> {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %SessionError::from(e), "Dropping undecodable frame");
                return None;
            }
        };

        match ServerMessage::from_envelope(&envelope) {
            Ok(message) => self.dispatch(message),
            Err(e) => {
                tracing::warn!(
                    kind = %envelope.kind,
                    error = %SessionError::from(e),
                    "Dropping frame with invalid payload"
                );
                return None;
            }
        }

        self.events.emit(&SessionEvent::Message(envelope.clone()));
        Some(envelope)
    }

    fn dispatch(&self, message: ServerMessage) {
        match message {
            ServerMessage::GameStateUpdate(snapshot) => {
                self.game_state.update_game_state(&snapshot);
                self.events.emit(&SessionEvent::GameStateUpdate(snapshot));
            }
            ServerMessage::RoomUpdate(snapshot) => {
                self.game_state.update_room(&snapshot);
                self.events.emit(&SessionEvent::RoomUpdate(snapshot));
            }
            ServerMessage::PlayerAction(data) => {
                let notice = player_action_notice(&data);
                self.events.emit(&SessionEvent::PlayerAction(data));
                if let Some(notice) = notice {
                    self.notices.notify(notice);
                }
            }
            ServerMessage::Error(data) => {
                let message = data
                    .message
                    .clone()
                    .unwrap_or_else(|| ERROR_FALLBACK.to_string());
                tracing::warn!(message = %message, "Server reported an error");
                self.notices.notify(Notice::new(
                    NoticeLevel::Negative,
                    message,
                    ERROR_NOTICE_MS,
                    NoticePosition::Top,
                ));
                self.events.emit(&SessionEvent::ServerError(data));
            }
            ServerMessage::Notification(data) => {
                self.notices.notify(notification_notice(&data));
                self.events.emit(&SessionEvent::Notification(data));
            }
            ServerMessage::Heartbeat(_) => {}
            ServerMessage::Unknown { kind, .. } => {
                tracing::debug!(kind = %kind, "Unhandled server message type");
            }
        }
    }
}

/// Human wording of a raw action name.
pub fn action_text(action: &str) -> &str {
    match action {
        "call" => "calls",
        "raise" => "raises",
        "fold" => "folds",
        "check" => "checks",
        "all_in" => "goes all in",
        other => other,
    }
}

fn player_action_notice(data: &PlayerActionData) -> Option<Notice> {
    let name = data.player_name.as_deref()?;
    let action = data.action.as_deref()?;
    Some(Notice::new(
        NoticeLevel::Info,
        format!("{name} {}", action_text(action)),
        PLAYER_ACTION_NOTICE_MS,
        NoticePosition::TopRight,
    ))
}

fn notification_notice(data: &NotificationData) -> Notice {
    Notice::new(
        data.level
            .as_deref()
            .map_or(NoticeLevel::Info, NoticeLevel::from_wire),
        data.message.clone(),
        data.timeout.unwrap_or(NOTIFICATION_DEFAULT_MS),
        data.position
            .as_deref()
            .map_or(NoticePosition::Top, NoticePosition::from_wire),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use mockall::predicate::eq;
    use serde_json::json;

    use crate::ports::outbound::{EventKind, MockGameStatePort, MockNoticePort};

    fn recorded(bus: &EventBus) -> Arc<Mutex<Vec<SessionEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        bus.on_any(move |event| sink.lock().unwrap().push(event.clone()));
        log
    }

    #[test]
    fn test_game_state_update_reaches_store_then_subscribers() {
        let mut game_state = MockGameStatePort::new();
        game_state
            .expect_update_game_state()
            .with(eq(json!({ "pot": 120 })))
            .times(1)
            .return_const(());
        let notices = MockNoticePort::new();
        let bus = EventBus::new();
        let log = recorded(&bus);

        let router = InboundRouter {
            game_state: &game_state,
            notices: &notices,
            events: &bus,
        };
        let envelope = router
            .route(r#"{"type":"game_state_update","payload":{"pot":120}}"#)
            .unwrap();

        assert_eq!(envelope.kind, "game_state_update");
        let log = log.lock().unwrap();
        assert_eq!(
            log.iter().map(SessionEvent::kind).collect::<Vec<_>>(),
            vec![EventKind::GameStateUpdate, EventKind::Message]
        );
    }

    #[test]
    fn test_room_update_reaches_store() {
        let mut game_state = MockGameStatePort::new();
        game_state
            .expect_update_room()
            .with(eq(json!({ "players": [] })))
            .times(1)
            .return_const(());
        let notices = MockNoticePort::new();
        let bus = EventBus::new();

        let router = InboundRouter {
            game_state: &game_state,
            notices: &notices,
            events: &bus,
        };
        assert!(router
            .route(r#"{"type":"room_update","payload":{"players":[]}}"#)
            .is_some());
    }

    #[test]
    fn test_player_action_raises_worded_notice() {
        let game_state = MockGameStatePort::new();
        let mut notices = MockNoticePort::new();
        notices
            .expect_notify()
            .with(eq(Notice::new(
                NoticeLevel::Info,
                "alice goes all in",
                2_000,
                NoticePosition::TopRight,
            )))
            .times(1)
            .return_const(());
        let bus = EventBus::new();

        let router = InboundRouter {
            game_state: &game_state,
            notices: &notices,
            events: &bus,
        };
        router.route(
            r#"{"type":"player_action","payload":{"player_name":"alice","action":"all_in","amount":500}}"#,
        );
    }

    #[test]
    fn test_player_action_without_name_raises_no_notice() {
        let game_state = MockGameStatePort::new();
        let mut notices = MockNoticePort::new();
        notices.expect_notify().never();
        let bus = EventBus::new();
        let log = recorded(&bus);

        let router = InboundRouter {
            game_state: &game_state,
            notices: &notices,
            events: &bus,
        };
        router.route(r#"{"type":"player_action","payload":{"action":"fold"}}"#);

        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_server_error_uses_fallback_message() {
        let game_state = MockGameStatePort::new();
        let mut notices = MockNoticePort::new();
        notices
            .expect_notify()
            .with(eq(Notice::new(
                NoticeLevel::Negative,
                "An error occurred",
                5_000,
                NoticePosition::Top,
            )))
            .times(1)
            .return_const(());
        let bus = EventBus::new();
        let log = recorded(&bus);

        let router = InboundRouter {
            game_state: &game_state,
            notices: &notices,
            events: &bus,
        };
        router.route(r#"{"type":"error"}"#);

        assert_eq!(
            log.lock().unwrap()[0],
            SessionEvent::ServerError(holdem_shared::ErrorData { message: None })
        );
    }

    #[test]
    fn test_notification_defaults() {
        let game_state = MockGameStatePort::new();
        let mut notices = MockNoticePort::new();
        notices
            .expect_notify()
            .with(eq(Notice::new(
                NoticeLevel::Info,
                "Blinds are going up",
                3_000,
                NoticePosition::Top,
            )))
            .times(1)
            .return_const(());
        let bus = EventBus::new();

        let router = InboundRouter {
            game_state: &game_state,
            notices: &notices,
            events: &bus,
        };
        router.route(r#"{"type":"notification","payload":{"message":"Blinds are going up"}}"#);
    }

    #[test]
    fn test_notification_honours_server_style() {
        let game_state = MockGameStatePort::new();
        let mut notices = MockNoticePort::new();
        notices
            .expect_notify()
            .with(eq(Notice::new(
                NoticeLevel::Warning,
                "Table closing",
                8_000,
                NoticePosition::TopRight,
            )))
            .times(1)
            .return_const(());
        let bus = EventBus::new();

        let router = InboundRouter {
            game_state: &game_state,
            notices: &notices,
            events: &bus,
        };
        router.route(
            r#"{"type":"notification","payload":{"message":"Table closing","timeout":8000,"position":"top-right","type":"warning"}}"#,
        );
    }

    #[test]
    fn test_malformed_frame_is_dropped_silently() {
        let game_state = MockGameStatePort::new();
        let notices = MockNoticePort::new();
        let bus = EventBus::new();
        let log = recorded(&bus);

        let router = InboundRouter {
            game_state: &game_state,
            notices: &notices,
            events: &bus,
        };

        assert!(router.route("{not json").is_none());
        assert!(router.route(r#"{"payload":{}}"#).is_none());
        assert!(router.route(r#"{"type":"room_update"}"#).is_none());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_heartbeat_and_unknown_only_emit_message() {
        let game_state = MockGameStatePort::new();
        let notices = MockNoticePort::new();
        let bus = EventBus::new();
        let log = recorded(&bus);

        let router = InboundRouter {
            game_state: &game_state,
            notices: &notices,
            events: &bus,
        };
        router.route(r#"{"type":"heartbeat","payload":{"timestamp":1}}"#);
        router.route(r#"{"type":"pong"}"#);

        let log = log.lock().unwrap();
        assert_eq!(
            log.iter().map(SessionEvent::kind).collect::<Vec<_>>(),
            vec![EventKind::Message, EventKind::Message]
        );
    }

    #[test]
    fn test_action_text_passes_unknown_actions_through() {
        assert_eq!(action_text("check"), "checks");
        assert_eq!(action_text("straddle"), "straddle");
    }
}
