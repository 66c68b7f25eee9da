//! Disconnect reconciliation.
//!
//! A vanished connection leaves state behind in up to three places: an
//! editor slot on a drawing, a roster seat in a session, and the fabric
//! registration itself. The reconciler walks the fabric's ownership tables
//! to release all of it. Failures are logged and swallowed: the connection
//! is already gone, there is nobody to report them to.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::drawing::DrawingRegistry;
use crate::fabric::BroadcastFabric;
use crate::registry::SessionRegistry;
use crate::session::SessionCommand;
use crate::types::ConnectionId;

pub struct DisconnectReconciler {
    fabric: Arc<BroadcastFabric>,
    sessions: Arc<SessionRegistry>,
    drawings: Arc<DrawingRegistry>,
}

impl DisconnectReconciler {
    pub fn new(
        fabric: Arc<BroadcastFabric>,
        sessions: Arc<SessionRegistry>,
        drawings: Arc<DrawingRegistry>,
    ) -> Self {
        Self {
            fabric,
            sessions,
            drawings,
        }
    }

    /// Release everything a dead connection held. Safe to call for
    /// connections that never joined anything.
    #[instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn connection_lost(&self, connection_id: &ConnectionId) {
        if let Some(drawing_id) = self.fabric.drawing_room_of(connection_id) {
            if let Err(err) = self
                .drawings
                .release_editor(connection_id, &drawing_id)
                .await
            {
                debug!(%connection_id, %drawing_id, %err, "editor release after disconnect failed");
            }
        }

        if let Some(session_id) = self.fabric.session_room_of(connection_id) {
            let cmd = SessionCommand::ConnectionLost {
                connection: connection_id.clone(),
            };
            if let Err(err) = self.sessions.dispatch(&session_id, cmd) {
                debug!(%connection_id, %session_id, %err, "session reconciliation after disconnect failed");
            }
        }

        self.fabric.unregister(connection_id);
    }
}
