use crate::types::{DrawingId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A broadcast group. Connections join and leave rooms to receive session-
/// or drawing-scoped events. A connection holds at most one membership of
/// each kind at a time.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum RoomId {
    Session(SessionId),
    Drawing(DrawingId),
}

impl RoomId {
    pub fn session(id: impl Into<String>) -> Self {
        RoomId::Session(SessionId::new(id))
    }

    pub fn drawing(id: impl Into<String>) -> Self {
        RoomId::Drawing(DrawingId::new(id))
    }
}

impl From<SessionId> for RoomId {
    fn from(id: SessionId) -> Self {
        RoomId::Session(id)
    }
}

impl From<DrawingId> for RoomId {
    fn from(id: DrawingId) -> Self {
        RoomId::Drawing(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomId::Session(id) => write!(f, "session/{id}"),
            RoomId::Drawing(id) => write!(f, "drawing/{id}"),
        }
    }
}
