//! Event gateway: the single entry point for client traffic.
//!
//! The transport hands every inbound frame here as a tag plus payload. The
//! gateway decodes it into a [`ClientEvent`], then either queues a command
//! on the owning session's mailbox or applies a drawing operation directly
//! under the drawing's lock. Rejections are pushed back to the triggering
//! connection as an `Error` event; other connections never see them.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::drawing::DrawingRegistry;
use crate::error::GameError;
use crate::event::{ClientEvent, ServerEvent};
use crate::fabric::BroadcastFabric;
use crate::metrics::CoreMetrics;
use crate::registry::SessionRegistry;
use crate::session::SessionCommand;
use crate::types::ConnectionId;

pub struct EventGateway {
    fabric: Arc<BroadcastFabric>,
    sessions: Arc<SessionRegistry>,
    drawings: Arc<DrawingRegistry>,
    metrics: Arc<CoreMetrics>,
}

impl EventGateway {
    pub fn new(
        fabric: Arc<BroadcastFabric>,
        sessions: Arc<SessionRegistry>,
        drawings: Arc<DrawingRegistry>,
        metrics: Arc<CoreMetrics>,
    ) -> Self {
        Self {
            fabric,
            sessions,
            drawings,
            metrics,
        }
    }

    /// Handle one inbound frame from a connection. The returned error has
    /// already been reported to the connection; callers only need it for
    /// logging.
    #[instrument(skip(self, payload), fields(connection_id = %connection_id))]
    pub async fn handle(
        &self,
        connection_id: &ConnectionId,
        tag: &str,
        payload: &[u8],
    ) -> Result<(), GameError> {
        let event = match ClientEvent::decode(tag, payload) {
            Ok(event) => event,
            Err(err) => {
                debug!(%connection_id, tag, %err, "undecodable frame");
                self.reject(connection_id, &err);
                return Err(err);
            }
        };
        self.metrics.events_total.inc();

        match self.route(connection_id, event).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => {
                error!(%connection_id, tag, %err, "event hit a broken invariant");
                self.metrics.errors_total.inc();
                Err(err)
            }
            Err(err) => {
                debug!(%connection_id, tag, %err, "event rejected");
                self.reject(connection_id, &err);
                Err(err)
            }
        }
    }

    async fn route(
        &self,
        connection_id: &ConnectionId,
        event: ClientEvent,
    ) -> Result<(), GameError> {
        let connection = connection_id.clone();
        match event {
            // Session-scoped events become mailbox commands; their effects
            // and rejections are produced by the session worker.
            ClientEvent::JoinLobby {
                session_id,
                player_id,
            } => self.sessions.dispatch(
                &session_id,
                SessionCommand::Join {
                    connection,
                    player_id,
                },
            ),
            ClientEvent::LeaveLobby { session_id } => self
                .sessions
                .dispatch(&session_id, SessionCommand::Leave { connection }),
            ClientEvent::PlayerReady { session_id, ready } => self
                .sessions
                .dispatch(&session_id, SessionCommand::SetReady { connection, ready }),
            ClientEvent::UpdateSettings {
                session_id,
                draw_secs,
                rate_secs,
            } => self.sessions.dispatch(
                &session_id,
                SessionCommand::UpdateSettings {
                    connection,
                    draw_secs,
                    rate_secs,
                },
            ),
            ClientEvent::StartCompetition { session_id } => self
                .sessions
                .dispatch(&session_id, SessionCommand::StartCompetition { connection }),
            ClientEvent::StartDrawing {
                session_id,
                drawing_id,
            } => self.sessions.dispatch(
                &session_id,
                SessionCommand::StartDrawing {
                    connection,
                    drawing_id,
                },
            ),
            ClientEvent::SendDrawing { session_id, bitmap } => self.sessions.dispatch(
                &session_id,
                SessionCommand::SendDrawing { connection, bitmap },
            ),
            ClientEvent::RateReady { session_id } => self
                .sessions
                .dispatch(&session_id, SessionCommand::RateReady { connection }),
            ClientEvent::SendRating {
                session_id,
                ratee_id,
                score,
            } => self.sessions.dispatch(
                &session_id,
                SessionCommand::SendRating {
                    connection,
                    ratee_id,
                    score,
                },
            ),
            ClientEvent::PlayAgain { session_id } => self
                .sessions
                .dispatch(&session_id, SessionCommand::PlayAgain { connection }),

            // Drawing-scoped events are applied inline under the drawing's
            // lock, so their broadcasts stay ordered with the mutation.
            ClientEvent::JoinDrawing { drawing_id } => {
                self.drawings.join_editor(connection_id, &drawing_id).await
            }
            ClientEvent::LeaveDrawing { drawing_id, bitmap } => {
                self.drawings
                    .leave_editor(connection_id, &drawing_id, bitmap)
                    .await
            }
            ClientEvent::AppendAction {
                drawing_id,
                payload,
            } => self
                .drawings
                .append_action(&drawing_id, payload)
                .await
                .map(|_| ()),
            ClientEvent::UpdateAction {
                drawing_id,
                action_id,
                payload,
                selected,
            } => self
                .drawings
                .update_action(&drawing_id, &action_id, payload, selected)
                .await
                .map(|_| ()),
            ClientEvent::DeleteAction {
                drawing_id,
                action_id,
            } => {
                self.drawings
                    .delete_action(&drawing_id, &action_id)
                    .await
            }
            ClientEvent::MoveAction {
                drawing_id,
                action_id,
                new_index,
            } => {
                self.drawings
                    .move_action(&drawing_id, &action_id, new_index)
                    .await
            }
        }
    }

    fn reject(&self, connection_id: &ConnectionId, err: &GameError) {
        self.metrics.errors_total.inc();
        self.fabric.emit_to(connection_id, ServerEvent::error(err));
    }
}
