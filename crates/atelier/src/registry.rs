//! Session registry: spawns and addresses session workers.
//!
//! Each session gets a dedicated tokio task reading from a bounded mailbox.
//! Dispatching to a session never touches its state directly, so two
//! commands for the same session can never interleave. Workers remove
//! themselves from the registry when their session tears down.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::GameConfig;
use crate::drawing::DrawingRegistry;
use crate::error::GameError;
use crate::event::ServerEvent;
use crate::fabric::BroadcastFabric;
use crate::metrics::CoreMetrics;
use crate::session::{Flow, Session, SessionCommand, SessionWorker};
use crate::storage::{ProfileSink, SessionRecord, SessionStore};
use crate::types::{PlayerId, SessionId};

struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    join: Mutex<Option<JoinHandle<()>>>,
}

pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, Arc<SessionHandle>>>,
    fabric: Arc<BroadcastFabric>,
    drawings: Arc<DrawingRegistry>,
    store: Arc<dyn SessionStore>,
    profile: Arc<dyn ProfileSink>,
    config: GameConfig,
    metrics: Arc<CoreMetrics>,
    shutdown: CancellationToken,
}

impl SessionRegistry {
    pub fn new(
        fabric: Arc<BroadcastFabric>,
        drawings: Arc<DrawingRegistry>,
        store: Arc<dyn SessionStore>,
        profile: Arc<dyn ProfileSink>,
        config: GameConfig,
        metrics: Arc<CoreMetrics>,
    ) -> Result<Self, GameError> {
        config.validate()?;
        Ok(Self {
            sessions: Arc::new(DashMap::new()),
            fabric,
            drawings,
            store,
            profile,
            config,
            metrics,
            shutdown: CancellationToken::new(),
        })
    }

    /// Create a session and spawn its worker. The owner still has to join
    /// like everyone else; creation only opens the lobby.
    pub async fn create_session(
        &self,
        name: impl Into<String>,
        owner_id: PlayerId,
        capacity: Option<usize>,
    ) -> Result<SessionId, GameError> {
        if self.shutdown.is_cancelled() {
            return Err(GameError::ShuttingDown);
        }
        let capacity = capacity
            .unwrap_or(self.config.default_capacity)
            .clamp(1, self.config.max_capacity);
        let session_id = SessionId::generate();
        let session = Session::new(
            session_id.clone(),
            name,
            owner_id,
            capacity,
            &self.config,
        );
        self.store.create(&session.record()).await?;

        let (tx, rx) = mpsc::channel(self.config.session_mailbox_capacity);
        let cancel = self.shutdown.child_token();
        let worker = SessionWorker::new(
            session,
            self.config.clone(),
            Arc::clone(&self.fabric),
            Arc::clone(&self.drawings),
            Arc::clone(&self.profile),
            Arc::clone(&self.store),
        );
        let join = tokio::spawn(Self::run_worker(
            session_id.clone(),
            worker,
            rx,
            cancel.clone(),
            Arc::clone(&self.sessions),
            Arc::clone(&self.fabric),
            Arc::clone(&self.metrics),
        ));

        let handle = Arc::new(SessionHandle {
            tx,
            cancel,
            join: Mutex::new(Some(join)),
        });
        self.sessions.insert(session_id.clone(), handle);
        self.metrics.sessions.inc();
        info!(%session_id, "session created");
        Ok(session_id)
    }

    async fn run_worker(
        session_id: SessionId,
        mut worker: SessionWorker,
        mut rx: mpsc::Receiver<SessionCommand>,
        cancel: CancellationToken,
        sessions: Arc<DashMap<SessionId, Arc<SessionHandle>>>,
        fabric: Arc<BroadcastFabric>,
        metrics: Arc<CoreMetrics>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                cmd = rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    let connection = cmd.connection().clone();
                    match worker.handle(cmd).await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Teardown) => break,
                        Err(err) if err.is_fatal() => {
                            error!(%session_id, %err, "session worker hit a broken invariant");
                            metrics.errors_total.inc();
                        }
                        Err(err) => {
                            debug!(%session_id, %connection, %err, "command rejected");
                            metrics.errors_total.inc();
                            fabric.emit_to(&connection, ServerEvent::error(&err));
                        }
                    }
                }
            }
        }
        if sessions.remove(&session_id).is_some() {
            metrics.sessions.dec();
        }
        debug!(%session_id, "session worker stopped");
    }

    /// Queue a command for a session's worker.
    pub fn dispatch(&self, session_id: &SessionId, cmd: SessionCommand) -> Result<(), GameError> {
        let handle = self
            .sessions
            .get(session_id)
            .map(|h| Arc::clone(&h))
            .ok_or_else(|| GameError::SessionNotFound {
                session_id: session_id.clone(),
            })?;
        match handle.tx.try_send(cmd) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%session_id, "session mailbox full, command dropped");
                Err(GameError::MailboxFull {
                    session_id: session_id.clone(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(GameError::SessionNotFound {
                session_id: session_id.clone(),
            }),
        }
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The browsable session directory.
    pub async fn list_sessions(&self) -> Result<Vec<SessionRecord>, GameError> {
        self.store.list_all().await
    }

    /// Stop one session worker without the owner-left choreography.
    pub async fn destroy(&self, session_id: &SessionId) -> Result<(), GameError> {
        let handle = self
            .sessions
            .get(session_id)
            .map(|h| Arc::clone(&h))
            .ok_or_else(|| GameError::SessionNotFound {
                session_id: session_id.clone(),
            })?;
        handle.cancel.cancel();
        let join = handle.join.lock().take();
        if let Some(join) = join {
            let _ = join.await;
        }
        self.store.delete(session_id).await?;
        Ok(())
    }

    /// Cancel every worker and wait for them to drain.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let joins: Vec<_> = self
            .sessions
            .iter()
            .filter_map(|entry| entry.value().join.lock().take())
            .collect();
        if tokio::time::timeout(
            self.config.worker_drain_timeout,
            futures::future::join_all(joins),
        )
        .await
        .is_err()
        {
            warn!("session workers did not stop within the drain timeout");
        }
        info!("session registry shut down");
    }
}
