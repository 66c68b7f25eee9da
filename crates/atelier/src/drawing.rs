//! Drawing registry: one mutex-guarded state per live drawing.
//!
//! Album drawings are opened on first join and edited collaboratively;
//! competition drawings are created by a session for one player and torn
//! down with the session. All edits and their broadcasts happen inside the
//! drawing's critical section, so every editor observes mutations in the
//! same order the log applied them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::action_log::{Action, ActionLog, ActionPayload};
use crate::config::GameConfig;
use crate::error::GameError;
use crate::event::ServerEvent;
use crate::fabric::BroadcastFabric;
use crate::metrics::CoreMetrics;
use crate::types::{ActionId, ConnectionId, DrawingId, PlayerId, RoomId, SessionId};

/// What a drawing belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawingKind {
    /// A player's own drawing, edited collaboratively outside competitions.
    Album,
    /// One player's surface for one competition round.
    Competition {
        session_id: SessionId,
        player_id: PlayerId,
    },
}

#[derive(Debug)]
pub struct DrawingState {
    pub id: DrawingId,
    pub kind: DrawingKind,
    /// Connections currently editing. Bounded by
    /// [`GameConfig::max_editors_per_drawing`].
    pub editor_count: usize,
    /// Last rendered bitmap, reported by clients on leave or submit.
    pub bitmap: String,
    pub log: ActionLog,
}

impl DrawingState {
    fn new(id: DrawingId, kind: DrawingKind) -> Self {
        Self {
            log: ActionLog::new(id.clone()),
            id,
            kind,
            editor_count: 0,
            bitmap: String::new(),
        }
    }
}

pub struct DrawingRegistry {
    drawings: DashMap<DrawingId, Arc<Mutex<DrawingState>>>,
    /// Index from (session, player) to that player's competition drawing.
    competition_index: DashMap<(SessionId, PlayerId), DrawingId>,
    fabric: Arc<BroadcastFabric>,
    config: GameConfig,
    metrics: Arc<CoreMetrics>,
}

impl DrawingRegistry {
    pub fn new(
        fabric: Arc<BroadcastFabric>,
        config: GameConfig,
        metrics: Arc<CoreMetrics>,
    ) -> Self {
        Self {
            drawings: DashMap::new(),
            competition_index: DashMap::new(),
            fabric,
            config,
            metrics,
        }
    }

    pub fn contains(&self, drawing_id: &DrawingId) -> bool {
        self.drawings.contains_key(drawing_id)
    }

    pub fn drawing_count(&self) -> usize {
        self.drawings.len()
    }

    /// Create a fresh competition surface for one player.
    pub fn create_competition(&self, session_id: &SessionId, player_id: &PlayerId) -> DrawingId {
        let drawing_id = DrawingId::generate();
        let kind = DrawingKind::Competition {
            session_id: session_id.clone(),
            player_id: player_id.clone(),
        };
        self.insert(DrawingState::new(drawing_id.clone(), kind));
        self.competition_index.insert(
            (session_id.clone(), player_id.clone()),
            drawing_id.clone(),
        );
        drawing_id
    }

    /// The competition drawing a player owns in a session, if any.
    pub fn competition_drawing_of(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
    ) -> Option<DrawingId> {
        self.competition_index
            .get(&(session_id.clone(), player_id.clone()))
            .map(|d| d.clone())
    }

    /// Delete one player's competition drawing. A no-op if none exists.
    pub fn delete_competition_drawing(&self, session_id: &SessionId, player_id: &PlayerId) {
        if let Some((_, drawing_id)) = self
            .competition_index
            .remove(&(session_id.clone(), player_id.clone()))
        {
            self.delete(&drawing_id);
        }
    }

    /// Delete every competition drawing belonging to a session.
    pub fn delete_for_session(&self, session_id: &SessionId) {
        let doomed: Vec<_> = self
            .competition_index
            .iter()
            .filter(|entry| entry.key().0 == *session_id)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (key, drawing_id) in doomed {
            self.competition_index.remove(&key);
            self.delete(&drawing_id);
        }
    }

    /// Remove a drawing and evict its room. A no-op if absent.
    pub fn delete(&self, drawing_id: &DrawingId) {
        if self.drawings.remove(drawing_id).is_some() {
            self.metrics.drawings.dec();
            self.fabric.clear_room(&RoomId::Drawing(drawing_id.clone()));
        }
    }

    /// Current bitmap of a player's competition drawing.
    pub async fn bitmap_of(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
    ) -> Result<String, GameError> {
        let drawing_id = self
            .competition_drawing_of(session_id, player_id)
            .ok_or_else(|| GameError::PlayerNotFound {
                player_id: player_id.clone(),
            })?;
        let state = self.get(&drawing_id)?;
        let state = state.lock().await;
        Ok(state.bitmap.clone())
    }

    /// Store the rendered bitmap of a player's competition drawing.
    pub async fn set_competition_bitmap(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
        bitmap: String,
    ) -> Result<(), GameError> {
        let drawing_id = self
            .competition_drawing_of(session_id, player_id)
            .ok_or_else(|| GameError::PlayerNotFound {
                player_id: player_id.clone(),
            })?;
        let state = self.get(&drawing_id)?;
        state.lock().await.bitmap = bitmap;
        Ok(())
    }

    /// The edit history of a drawing, in index order.
    pub async fn actions(&self, drawing_id: &DrawingId) -> Result<Vec<Action>, GameError> {
        let state = self.get(drawing_id)?;
        let state = state.lock().await;
        Ok(state.log.list())
    }

    /// Join a connection to a drawing as an editor. Album drawings are
    /// opened lazily on first join. The joining connection receives the
    /// current edit history before any later broadcast.
    pub async fn join_editor(
        &self,
        connection_id: &ConnectionId,
        drawing_id: &DrawingId,
    ) -> Result<(), GameError> {
        let state = self
            .drawings
            .entry(drawing_id.clone())
            .or_insert_with(|| {
                self.metrics.drawings.inc();
                Arc::new(Mutex::new(DrawingState::new(
                    drawing_id.clone(),
                    DrawingKind::Album,
                )))
            })
            .clone();

        let mut state = state.lock().await;
        if state.editor_count >= self.config.max_editors_per_drawing {
            return Err(GameError::EditorLimitReached {
                drawing_id: drawing_id.clone(),
                max_editors: self.config.max_editors_per_drawing,
            });
        }
        state.editor_count += 1;
        self.fabric
            .join(connection_id, RoomId::Drawing(drawing_id.clone()));
        self.fabric.emit_to(
            connection_id,
            ServerEvent::DrawingJoined {
                drawing_id: drawing_id.clone(),
                actions: state.log.list(),
            },
        );
        Ok(())
    }

    /// A connection stops editing: record its final bitmap, free the editor
    /// slot, and tell the remaining editors.
    pub async fn leave_editor(
        &self,
        connection_id: &ConnectionId,
        drawing_id: &DrawingId,
        bitmap: String,
    ) -> Result<(), GameError> {
        let state = self.get(drawing_id)?;
        let mut state = state.lock().await;
        state.bitmap = bitmap;
        state.editor_count = state.editor_count.saturating_sub(1);
        self.fabric
            .leave(connection_id, &RoomId::Drawing(drawing_id.clone()));
        self.fabric.emit_to_room(
            &RoomId::Drawing(drawing_id.clone()),
            ServerEvent::EditorLeft {
                drawing_id: drawing_id.clone(),
            },
        );
        Ok(())
    }

    /// Free an editor slot for a connection that vanished without a
    /// farewell. No bitmap is recorded.
    pub async fn release_editor(
        &self,
        connection_id: &ConnectionId,
        drawing_id: &DrawingId,
    ) -> Result<(), GameError> {
        let state = self.get(drawing_id)?;
        let mut state = state.lock().await;
        state.editor_count = state.editor_count.saturating_sub(1);
        self.fabric
            .leave(connection_id, &RoomId::Drawing(drawing_id.clone()));
        self.fabric.emit_to_room(
            &RoomId::Drawing(drawing_id.clone()),
            ServerEvent::EditorLeft {
                drawing_id: drawing_id.clone(),
            },
        );
        debug!(%connection_id, %drawing_id, "editor slot released after disconnect");
        Ok(())
    }

    /// Append an action and broadcast it, both inside the drawing's
    /// critical section.
    pub async fn append_action(
        &self,
        drawing_id: &DrawingId,
        payload: ActionPayload,
    ) -> Result<Action, GameError> {
        let state = self.get(drawing_id)?;
        let mut state = state.lock().await;
        let action = state.log.append(payload);
        self.fabric.emit_to_room(
            &RoomId::Drawing(drawing_id.clone()),
            ServerEvent::ActionAppended {
                drawing_id: drawing_id.clone(),
                action: action.clone(),
            },
        );
        Ok(action)
    }

    pub async fn update_action(
        &self,
        drawing_id: &DrawingId,
        action_id: &ActionId,
        payload: ActionPayload,
        selected: bool,
    ) -> Result<Action, GameError> {
        let state = self.get(drawing_id)?;
        let mut state = state.lock().await;
        let action = state.log.update(action_id, payload, selected)?;
        self.fabric.emit_to_room(
            &RoomId::Drawing(drawing_id.clone()),
            ServerEvent::ActionUpdated {
                drawing_id: drawing_id.clone(),
                action: action.clone(),
            },
        );
        Ok(action)
    }

    pub async fn delete_action(
        &self,
        drawing_id: &DrawingId,
        action_id: &ActionId,
    ) -> Result<(), GameError> {
        let state = self.get(drawing_id)?;
        let mut state = state.lock().await;
        let deleted = state.log.delete(action_id)?;
        self.fabric.emit_to_room(
            &RoomId::Drawing(drawing_id.clone()),
            ServerEvent::ActionDeleted {
                drawing_id: drawing_id.clone(),
                action_id: deleted,
            },
        );
        Ok(())
    }

    /// Move an action to a new index and broadcast the full reordered
    /// history. The target index is validated here, before the log's
    /// stricter in-range contract applies.
    pub async fn move_action(
        &self,
        drawing_id: &DrawingId,
        action_id: &ActionId,
        new_index: usize,
    ) -> Result<(), GameError> {
        let state = self.get(drawing_id)?;
        let mut state = state.lock().await;
        if new_index >= state.log.len() {
            return Err(GameError::MalformedEvent {
                reason: format!(
                    "move target {new_index} out of range for drawing {drawing_id} with {} actions",
                    state.log.len()
                ),
                source: None,
            });
        }
        let actions = state.log.move_to(action_id, new_index)?;
        self.fabric.emit_to_room(
            &RoomId::Drawing(drawing_id.clone()),
            ServerEvent::ActionsReordered {
                drawing_id: drawing_id.clone(),
                actions,
            },
        );
        Ok(())
    }

    fn insert(&self, state: DrawingState) {
        self.metrics.drawings.inc();
        self.drawings
            .insert(state.id.clone(), Arc::new(Mutex::new(state)));
    }

    fn get(&self, drawing_id: &DrawingId) -> Result<Arc<Mutex<DrawingState>>, GameError> {
        self.drawings
            .get(drawing_id)
            .map(|s| Arc::clone(&s))
            .ok_or_else(|| GameError::DrawingNotFound {
                drawing_id: drawing_id.clone(),
            })
    }
}
