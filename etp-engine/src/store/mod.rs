//! Session persistence: a repository trait with optimistic versioning and two
//! backends (in-memory for tests and demos, SQLite for durable storage).
//!
//! Saves are compare-and-swap on the per-session version counter. A retried
//! client request can therefore never silently overwrite a concurrently
//! committed snapshot; the conflict is reported to the caller instead.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Session, SessionId};

pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error("version conflict for session {id}: expected {expected}, stored {actual}")]
    Conflict {
        id: SessionId,
        expected: u64,
        actual: u64,
    },
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Repository contract for session snapshots. `save` succeeds only when
/// `expected_version` matches the stored version (0 for a session not yet
/// persisted) and returns the new version; the stored snapshot carries it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Session, StoreError>;
    async fn save(&self, session: &Session, expected_version: u64) -> Result<u64, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}
