//! Game State Port - domain state container fed by the session client.
//!
//! The room/game store lives outside this crate. The session client forwards
//! server snapshots to it and keeps its connection flag current.

use serde_json::Value;

/// Port for the room/game state collaborator.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait GameStatePort: Send + Sync {
    /// A `game_state_update` snapshot arrived
    fn update_game_state(&self, snapshot: &Value);

    /// A `room_update` snapshot arrived
    fn update_room(&self, snapshot: &Value);

    /// The connection opened (`true`) or went down (`false`)
    fn set_connected(&self, connected: bool);
}

/// Collaborator that ignores everything, for clients without a state store.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedGameState;

impl GameStatePort for DetachedGameState {
    fn update_game_state(&self, _snapshot: &Value) {}

    fn update_room(&self, _snapshot: &Value) {}

    fn set_connected(&self, _connected: bool) {}
}
