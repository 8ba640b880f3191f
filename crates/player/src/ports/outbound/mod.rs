//! Outbound ports - Interfaces for external collaborators
//!
//! These ports define the contracts the session client depends on, allowing it
//! to drive domain state containers and user notices without depending on
//! concrete implementations.

pub mod clock_port;
pub mod error;
pub mod game_state_port;
pub mod notice_port;
pub mod session_events;

pub use clock_port::ClockPort;
pub use error::{SessionError, TransportError};
pub use game_state_port::{DetachedGameState, GameStatePort};
pub use notice_port::{Notice, NoticeLevel, NoticePort, NoticePosition, TracingNotices};
pub use session_events::{EventKind, SessionEvent};

#[cfg(any(test, feature = "testing"))]
pub use game_state_port::MockGameStatePort;
#[cfg(any(test, feature = "testing"))]
pub use notice_port::MockNoticePort;
