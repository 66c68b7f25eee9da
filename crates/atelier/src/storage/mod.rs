//! Persistence seams for session listings and player profiles.
//!
//! The core keeps all live game state in memory; these traits cover the two
//! things that outlive a connection: the browsable session directory and
//! per-player history. Production deployments plug in a database-backed
//! implementation; tests and single-node setups use the in-memory ones.

mod memory;

pub use memory::{MemoryProfileSink, MemorySessionStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::types::{PlayerId, SessionId};

/// Durable description of a session, as shown in the session directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub name: String,
    pub owner_id: PlayerId,
    pub capacity: usize,
    pub draw_secs: u64,
    pub rate_secs: u64,
    pub created_at: DateTime<Utc>,
}

/// Directory of open sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Save a newly created session.
    async fn create(&self, record: &SessionRecord) -> Result<(), GameError>;

    /// Look up one session by id.
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, GameError>;

    /// Remove a closed session. Removing an absent session is not an error.
    async fn delete(&self, id: &SessionId) -> Result<(), GameError>;

    /// All open sessions, most recent first.
    async fn list_all(&self) -> Result<Vec<SessionRecord>, GameError>;
}

/// What a competition outcome looked like for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub player_id: PlayerId,
    pub session_name: String,
    /// 1-based final position in the standings.
    pub rank: usize,
    pub recorded_at: DateTime<Utc>,
}

/// Sink for per-player history. Calls are fire-and-forget from the session
/// workers; implementations must not block the game on slow storage.
#[async_trait]
pub trait ProfileSink: Send + Sync {
    /// Credit rating points to a player's lifetime total.
    async fn add_score(&self, player_id: &PlayerId, score: i64) -> Result<(), GameError>;

    /// Record a finished competition in a player's activity feed.
    async fn record_activity(&self, record: &ActivityRecord) -> Result<(), GameError>;
}
