//! In-memory game harness for unit and integration testing.
//!
//! Wires the fabric, registries, gateway, and reconciler together over
//! in-memory storage, so whole game flows can be driven through the wire
//! surface without a transport.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::GameConfig;
use crate::drawing::DrawingRegistry;
use crate::error::GameError;
use crate::event::ServerEvent;
use crate::fabric::BroadcastFabric;
use crate::gateway::EventGateway;
use crate::metrics::CoreMetrics;
use crate::reconciler::DisconnectReconciler;
use crate::registry::SessionRegistry;
use crate::storage::{MemoryProfileSink, MemorySessionStore, ProfileSink, SessionStore};
use crate::types::{ConnectionId, PlayerId, SessionId};

/// A complete single-process game core over in-memory storage.
///
/// # Example
///
/// ```ignore
/// let harness = TestHarness::new();
/// let session_id = harness.create_session("lobby", "owner").await.unwrap();
/// let (conn, mut rx) = harness.connect("owner");
/// harness.send(&conn, "join-lobby", &(session_id, PlayerId::new("owner"))).await.unwrap();
/// let event = TestHarness::next_event(&mut rx).await;
/// ```
pub struct TestHarness {
    pub config: GameConfig,
    pub metrics: Arc<CoreMetrics>,
    pub fabric: Arc<BroadcastFabric>,
    pub drawings: Arc<DrawingRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub store: Arc<MemorySessionStore>,
    pub profile: Arc<MemoryProfileSink>,
    pub gateway: EventGateway,
    pub reconciler: DisconnectReconciler,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    pub fn with_config(config: GameConfig) -> Self {
        let metrics = Arc::new(CoreMetrics::unregistered());
        let fabric = Arc::new(BroadcastFabric::new(Arc::clone(&metrics)));
        let drawings = Arc::new(DrawingRegistry::new(
            Arc::clone(&fabric),
            config.clone(),
            Arc::clone(&metrics),
        ));
        let store = Arc::new(MemorySessionStore::new());
        let profile = Arc::new(MemoryProfileSink::new());
        let sessions = Arc::new(
            SessionRegistry::new(
                Arc::clone(&fabric),
                Arc::clone(&drawings),
                Arc::clone(&store) as Arc<dyn SessionStore>,
                Arc::clone(&profile) as Arc<dyn ProfileSink>,
                config.clone(),
                Arc::clone(&metrics),
            )
            .expect("TestHarness config should be valid"),
        );
        let gateway = EventGateway::new(
            Arc::clone(&fabric),
            Arc::clone(&sessions),
            Arc::clone(&drawings),
            Arc::clone(&metrics),
        );
        let reconciler = DisconnectReconciler::new(
            Arc::clone(&fabric),
            Arc::clone(&sessions),
            Arc::clone(&drawings),
        );
        Self {
            config,
            metrics,
            fabric,
            drawings,
            sessions,
            store,
            profile,
            gateway,
            reconciler,
        }
    }

    /// Register a connection and return it with its outbound event stream.
    pub fn connect(&self, name: &str) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
        let connection_id = ConnectionId::new(format!("conn-{name}"));
        let rx = self.fabric.register(connection_id.clone());
        (connection_id, rx)
    }

    /// Create a session owned by `owner` with the default capacity.
    pub async fn create_session(
        &self,
        name: &str,
        owner: &str,
    ) -> Result<SessionId, GameError> {
        self.sessions
            .create_session(name, PlayerId::new(owner), None)
            .await
    }

    /// Push one wire frame through the gateway, encoding the positional
    /// arguments as MessagePack.
    pub async fn send<T: Serialize>(
        &self,
        connection_id: &ConnectionId,
        tag: &str,
        args: &T,
    ) -> Result<(), GameError> {
        let payload = rmp_serde::to_vec(args).map_err(|e| GameError::MalformedEvent {
            reason: format!("test payload for '{tag}' failed to encode"),
            source: Some(Box::new(e)),
        })?;
        self.gateway.handle(connection_id, tag, &payload).await
    }

    /// The next event delivered to a connection, waiting up to a second.
    pub async fn next_event(rx: &mut UnboundedReceiver<ServerEvent>) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for server event")
            .expect("connection channel closed")
    }

    /// Skip events until one with the given tag arrives.
    pub async fn next_tagged(
        rx: &mut UnboundedReceiver<ServerEvent>,
        tag: &str,
    ) -> ServerEvent {
        loop {
            let event = Self::next_event(rx).await;
            if event.tag() == tag {
                return event;
            }
        }
    }

    /// Give spawned session workers a beat to drain their mailboxes.
    pub async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
