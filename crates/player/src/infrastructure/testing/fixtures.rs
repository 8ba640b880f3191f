//! Recording collaborators and a controllable clock for tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::ports::outbound::{ClockPort, GameStatePort, Notice, NoticePort};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clock frozen at a settable instant.
pub struct FixedClock {
    time: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Mutex::new(time),
        }
    }

    /// Frozen at `millis` since the Unix epoch.
    pub fn at_millis(millis: i64) -> Self {
        Self::new(Utc.timestamp_millis_opt(millis).single().unwrap_or_default())
    }

    pub fn advance(&self, by: Duration) {
        let mut time = lock(&self.time);
        *time += by;
    }
}

impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.time)
    }
}

/// Notice sink that keeps every notice.
#[derive(Default)]
pub struct RecordingNotices {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.notices)
            .iter()
            .map(|notice| notice.message.clone())
            .collect()
    }
}

impl NoticePort for RecordingNotices {
    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}

/// Calls received by [`RecordingGameState`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum GameStateCall {
    GameState(Value),
    Room(Value),
    Connected(bool),
}

/// Game-state collaborator that keeps every call.
#[derive(Default)]
pub struct RecordingGameState {
    calls: Mutex<Vec<GameStateCall>>,
}

impl RecordingGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<GameStateCall> {
        lock(&self.calls).clone()
    }

    /// The last value passed to `set_connected`, if any.
    pub fn connected(&self) -> Option<bool> {
        lock(&self.calls).iter().rev().find_map(|call| match call {
            GameStateCall::Connected(connected) => Some(*connected),
            _ => None,
        })
    }
}

impl GameStatePort for RecordingGameState {
    fn update_game_state(&self, snapshot: &Value) {
        lock(&self.calls).push(GameStateCall::GameState(snapshot.clone()));
    }

    fn update_room(&self, snapshot: &Value) {
        lock(&self.calls).push(GameStateCall::Room(snapshot.clone()));
    }

    fn set_connected(&self, connected: bool) {
        lock(&self.calls).push(GameStateCall::Connected(connected));
    }
}
