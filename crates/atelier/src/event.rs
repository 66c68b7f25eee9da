//! Typed event surface between connections and the game core.
//!
//! Inbound traffic arrives as a string tag plus a MessagePack payload of
//! positional arguments. [`ClientEvent::decode`] turns that pair into a
//! closed enum at the boundary; everything past the gateway works with
//! typed events only. Outbound traffic is the [`ServerEvent`] enum, encoded
//! with the matching tag by the transport layer.

use crate::action_log::{Action, ActionPayload};
use crate::error::GameError;
use crate::roster::PlayerSummary;
use crate::session::SessionSnapshot;
use crate::types::{ActionId, DrawingId, PlayerId, SessionId};
use serde::{Deserialize, Serialize};

/// Everything a client may ask the core to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    JoinLobby {
        session_id: SessionId,
        player_id: PlayerId,
    },
    LeaveLobby {
        session_id: SessionId,
    },
    PlayerReady {
        session_id: SessionId,
        ready: bool,
    },
    UpdateSettings {
        session_id: SessionId,
        draw_secs: u64,
        rate_secs: u64,
    },
    StartCompetition {
        session_id: SessionId,
    },
    StartDrawing {
        session_id: SessionId,
        drawing_id: DrawingId,
    },
    SendDrawing {
        session_id: SessionId,
        bitmap: String,
    },
    RateReady {
        session_id: SessionId,
    },
    SendRating {
        session_id: SessionId,
        ratee_id: PlayerId,
        score: i64,
    },
    PlayAgain {
        session_id: SessionId,
    },
    JoinDrawing {
        drawing_id: DrawingId,
    },
    LeaveDrawing {
        drawing_id: DrawingId,
        bitmap: String,
    },
    AppendAction {
        drawing_id: DrawingId,
        payload: ActionPayload,
    },
    UpdateAction {
        drawing_id: DrawingId,
        action_id: ActionId,
        payload: ActionPayload,
        selected: bool,
    },
    DeleteAction {
        drawing_id: DrawingId,
        action_id: ActionId,
    },
    MoveAction {
        drawing_id: DrawingId,
        action_id: ActionId,
        new_index: usize,
    },
}

impl ClientEvent {
    /// Decode a tagged MessagePack payload into a typed event. Unknown tags
    /// and payloads that do not match the tag's argument shape are rejected
    /// as [`GameError::MalformedEvent`].
    pub fn decode(tag: &str, payload: &[u8]) -> Result<Self, GameError> {
        match tag {
            "join-lobby" => {
                let (session_id, player_id) = args(tag, payload)?;
                Ok(Self::JoinLobby {
                    session_id,
                    player_id,
                })
            }
            "leave-lobby" => {
                let (session_id,): (SessionId,) = args(tag, payload)?;
                Ok(Self::LeaveLobby { session_id })
            }
            "player-ready" => {
                let (session_id, ready) = args(tag, payload)?;
                Ok(Self::PlayerReady { session_id, ready })
            }
            "update-settings" => {
                let (session_id, draw_secs, rate_secs) = args(tag, payload)?;
                Ok(Self::UpdateSettings {
                    session_id,
                    draw_secs,
                    rate_secs,
                })
            }
            "start-competition" => {
                let (session_id,): (SessionId,) = args(tag, payload)?;
                Ok(Self::StartCompetition { session_id })
            }
            "start-drawing" => {
                let (session_id, drawing_id) = args(tag, payload)?;
                Ok(Self::StartDrawing {
                    session_id,
                    drawing_id,
                })
            }
            "send-drawing" => {
                let (session_id, bitmap) = args(tag, payload)?;
                Ok(Self::SendDrawing { session_id, bitmap })
            }
            "rate-ready" => {
                let (session_id,): (SessionId,) = args(tag, payload)?;
                Ok(Self::RateReady { session_id })
            }
            "send-rating" => {
                let (session_id, ratee_id, score) = args(tag, payload)?;
                Ok(Self::SendRating {
                    session_id,
                    ratee_id,
                    score,
                })
            }
            "owner-play-again" => {
                let (session_id,): (SessionId,) = args(tag, payload)?;
                Ok(Self::PlayAgain { session_id })
            }
            "join-drawing" => {
                let (drawing_id,): (DrawingId,) = args(tag, payload)?;
                Ok(Self::JoinDrawing { drawing_id })
            }
            "leave-drawing" => {
                let (drawing_id, bitmap) = args(tag, payload)?;
                Ok(Self::LeaveDrawing { drawing_id, bitmap })
            }
            "update-drawing" => {
                let (drawing_id, payload) = args(tag, payload)?;
                Ok(Self::AppendAction {
                    drawing_id,
                    payload,
                })
            }
            "update-drawing-action" => {
                let (drawing_id, action_id, payload, selected) = args(tag, payload)?;
                Ok(Self::UpdateAction {
                    drawing_id,
                    action_id,
                    payload,
                    selected,
                })
            }
            "delete-drawing-action" => {
                let (drawing_id, action_id) = args(tag, payload)?;
                Ok(Self::DeleteAction {
                    drawing_id,
                    action_id,
                })
            }
            "update-drawing-action-index" => {
                let (drawing_id, action_id, new_index) = args(tag, payload)?;
                Ok(Self::MoveAction {
                    drawing_id,
                    action_id,
                    new_index,
                })
            }
            _ => Err(GameError::MalformedEvent {
                reason: format!("unknown event tag '{tag}'"),
                source: None,
            }),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::JoinLobby { .. } => "join-lobby",
            Self::LeaveLobby { .. } => "leave-lobby",
            Self::PlayerReady { .. } => "player-ready",
            Self::UpdateSettings { .. } => "update-settings",
            Self::StartCompetition { .. } => "start-competition",
            Self::StartDrawing { .. } => "start-drawing",
            Self::SendDrawing { .. } => "send-drawing",
            Self::RateReady { .. } => "rate-ready",
            Self::SendRating { .. } => "send-rating",
            Self::PlayAgain { .. } => "owner-play-again",
            Self::JoinDrawing { .. } => "join-drawing",
            Self::LeaveDrawing { .. } => "leave-drawing",
            Self::AppendAction { .. } => "update-drawing",
            Self::UpdateAction { .. } => "update-drawing-action",
            Self::DeleteAction { .. } => "delete-drawing-action",
            Self::MoveAction { .. } => "update-drawing-action-index",
        }
    }
}

fn args<'a, T: Deserialize<'a>>(tag: &str, payload: &'a [u8]) -> Result<T, GameError> {
    rmp_serde::from_slice(payload).map_err(|e| GameError::MalformedEvent {
        reason: format!("invalid payload for '{tag}'"),
        source: Some(Box::new(e)),
    })
}

/// Everything the core may push to a connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent to the joining connection only, with the full session snapshot.
    LobbyJoined { session: SessionSnapshot },
    PlayerAdded { player: PlayerSummary },
    PlayerRemoved { player_id: PlayerId },
    /// The owner left; the session is gone.
    LobbyClosed { session_id: SessionId },
    PlayerReady { player_id: PlayerId, ready: bool },
    SettingsUpdated { draw_secs: u64, rate_secs: u64 },
    /// Sent per connection: each player draws on their own surface.
    CompetitionStarted { drawing_id: DrawingId, word: String },
    DrawingStarted {
        drawing_id: DrawingId,
        actions: Vec<Action>,
    },
    RateDrawing { ratee_id: PlayerId, bitmap: String },
    Standings { players: Vec<PlayerSummary> },
    #[serde(rename = "owner-play-again")]
    PlayAgain { session: SessionSnapshot },
    /// Sent to the joining connection only, with the current edit history.
    DrawingJoined {
        drawing_id: DrawingId,
        actions: Vec<Action>,
    },
    EditorLeft { drawing_id: DrawingId },
    ActionAppended { drawing_id: DrawingId, action: Action },
    ActionUpdated { drawing_id: DrawingId, action: Action },
    ActionDeleted {
        drawing_id: DrawingId,
        action_id: ActionId,
    },
    /// Full post-move history so every editor converges on the same order.
    ActionsReordered {
        drawing_id: DrawingId,
        actions: Vec<Action>,
    },
    Error { reason: String },
}

impl ServerEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::LobbyJoined { .. } => "lobby-joined",
            Self::PlayerAdded { .. } => "add-player",
            Self::PlayerRemoved { .. } => "remove-player",
            Self::LobbyClosed { .. } => "close-lobby",
            Self::PlayerReady { .. } => "player-ready",
            Self::SettingsUpdated { .. } => "settings-updated",
            Self::CompetitionStarted { .. } => "start-competition",
            Self::DrawingStarted { .. } => "start-drawing",
            Self::RateDrawing { .. } => "rate-drawing",
            Self::Standings { .. } => "standings",
            Self::PlayAgain { .. } => "owner-play-again",
            Self::DrawingJoined { .. } => "drawing-joined",
            Self::EditorLeft { .. } => "editor-left",
            Self::ActionAppended { .. } => "update-drawing",
            Self::ActionUpdated { .. } => "update-drawing-action",
            Self::ActionDeleted { .. } => "delete-drawing-action",
            Self::ActionsReordered { .. } => "update-drawing-action-index",
            Self::Error { .. } => "error",
        }
    }

    pub fn error(err: &GameError) -> Self {
        Self::Error {
            reason: err.to_string(),
        }
    }
}
