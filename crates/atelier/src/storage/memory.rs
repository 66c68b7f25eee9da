//! In-memory storage, used by tests and single-node deployments.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::GameError;
use crate::storage::{ActivityRecord, ProfileSink, SessionRecord, SessionStore};
use crate::types::{PlayerId, SessionId};

/// [`SessionStore`] backed by a hash map.
#[derive(Default)]
pub struct MemorySessionStore {
    records: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, record: &SessionRecord) -> Result<(), GameError> {
        self.records
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, GameError> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), GameError> {
        self.records.write().remove(id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<SessionRecord>, GameError> {
        let mut records: Vec<_> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

/// [`ProfileSink`] that accumulates everything in memory. Tests use the
/// inspection methods to assert on what the game reported.
#[derive(Default)]
pub struct MemoryProfileSink {
    scores: RwLock<HashMap<PlayerId, i64>>,
    activity: RwLock<Vec<ActivityRecord>>,
}

impl MemoryProfileSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score_of(&self, player_id: &PlayerId) -> i64 {
        self.scores.read().get(player_id).copied().unwrap_or(0)
    }

    pub fn activity(&self) -> Vec<ActivityRecord> {
        self.activity.read().clone()
    }
}

#[async_trait]
impl ProfileSink for MemoryProfileSink {
    async fn add_score(&self, player_id: &PlayerId, score: i64) -> Result<(), GameError> {
        *self.scores.write().entry(player_id.clone()).or_insert(0) += score;
        Ok(())
    }

    async fn record_activity(&self, record: &ActivityRecord) -> Result<(), GameError> {
        self.activity.write().push(record.clone());
        Ok(())
    }
}
