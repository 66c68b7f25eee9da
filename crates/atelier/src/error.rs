use crate::types::{ActionId, ConnectionId, DrawingId, PlayerId, SessionId};

/// Errors that can occur in the game core.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("session {session_id} not found")]
    SessionNotFound { session_id: SessionId },

    #[error("drawing {drawing_id} not found")]
    DrawingNotFound { drawing_id: DrawingId },

    #[error("player {player_id} not found")]
    PlayerNotFound { player_id: PlayerId },

    #[error("action {action_id} not found in drawing {drawing_id}")]
    ActionNotFound {
        drawing_id: DrawingId,
        action_id: ActionId,
    },

    #[error("session is full ({capacity} players)")]
    CapacityExceeded { capacity: usize },

    #[error("drawing {drawing_id} has reached its editor limit ({max_editors})")]
    EditorLimitReached {
        drawing_id: DrawingId,
        max_editors: usize,
    },

    #[error("invalid transition: {reason}")]
    InvalidTransition { reason: String },

    /// The dense-index invariant of an action log was violated. This means a
    /// mutation ran outside the drawing's critical section; it is a
    /// programming error, not a recoverable user error.
    #[error("action log for drawing {drawing_id} lost its dense index invariant")]
    ConcurrentModification { drawing_id: DrawingId },

    #[error("malformed event: {reason}")]
    MalformedEvent {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("storage error: {reason}")]
    Storage {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("connection {connection_id} is not registered")]
    ConnectionNotRegistered { connection_id: ConnectionId },

    #[error("session {session_id} mailbox is full")]
    MailboxFull { session_id: SessionId },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("registry is shutting down")]
    ShuttingDown,
}

impl GameError {
    /// Whether this error indicates a broken internal invariant rather than
    /// a rejected request. Fatal errors are escalated, never reported back
    /// to the triggering connection as a routine rejection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GameError::ConcurrentModification { .. })
    }
}
