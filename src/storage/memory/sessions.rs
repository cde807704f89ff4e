use async_trait::async_trait;
use chrono::{DateTime, Utc};
use error_stack::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::auth::SessionError;
use crate::storage::{SessionRecord, SessionStore};

/// Volatile session table, lost whenever the process exits.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, record: SessionRecord) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(record.token.clone(), record);
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(token).cloned())
    }

    async fn delete(&self, token: &str) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(token).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));

        Ok(u64::try_from(before - sessions.len()).unwrap_or(u64::MAX))
    }
}
