// In-memory session store over a concurrent map

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{SessionStore, StoreError};
use crate::types::Session;

/// Process-local backend. The DashMap entry lock makes each save's
/// compare-and-swap atomic per session.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &str) -> Result<Session, StoreError> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn save(&self, session: &Session, expected_version: u64) -> Result<u64, StoreError> {
        // A rejected save must leave no trace: only insert once the
        // compare-and-swap has passed.
        match self.sessions.entry(session.id.clone()) {
            Entry::Occupied(mut entry) => {
                let actual = entry.get().version;
                if actual != expected_version {
                    return Err(StoreError::Conflict {
                        id: session.id.clone(),
                        expected: expected_version,
                        actual,
                    });
                }
                let mut committed = session.clone();
                committed.version = expected_version + 1;
                let new_version = committed.version;
                entry.insert(committed);
                Ok(new_version)
            }
            Entry::Vacant(entry) => {
                if expected_version != 0 {
                    return Err(StoreError::Conflict {
                        id: session.id.clone(),
                        expected: expected_version,
                        actual: 0,
                    });
                }
                let mut committed = session.clone();
                committed.version = 1;
                entry.insert(committed);
                Ok(1)
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.sessions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
