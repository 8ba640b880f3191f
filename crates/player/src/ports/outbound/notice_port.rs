//! Notice Port - best-effort user-facing notices.
//!
//! Raised on connect success, on server `error`/`notification`/`player_action`
//! frames, and when reconnection gives up. Routine reconnect attempts do not
//! raise notices.

/// Visual weight of a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeLevel {
    Positive,
    Negative,
    Warning,
    Info,
    /// Server-supplied style name that has no dedicated variant
    Other(String),
}

impl NoticeLevel {
    /// Map a server-supplied style name (`notification.type`).
    pub fn from_wire(value: &str) -> Self {
        match value {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            "warning" => Self::Warning,
            "info" => Self::Info,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Screen anchor for a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticePosition {
    Top,
    TopRight,
    /// Server-supplied position with no dedicated variant
    Other(String),
}

impl NoticePosition {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "top" => Self::Top,
            "top-right" => Self::TopRight,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A single user-facing notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub timeout_ms: u64,
    pub position: NoticePosition,
}

impl Notice {
    pub fn new(
        level: NoticeLevel,
        message: impl Into<String>,
        timeout_ms: u64,
        position: NoticePosition,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            timeout_ms,
            position,
        }
    }
}

/// Port for surfacing notices to the user.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait NoticePort: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notice sink that writes to the tracing log, for headless clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotices;

impl NoticePort for TracingNotices {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Negative => tracing::warn!(message = %notice.message, "Notice"),
            _ => tracing::info!(message = %notice.message, level = ?notice.level, "Notice"),
        }
    }
}
