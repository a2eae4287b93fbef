// SQLite session store: one JSON document row per session with a version
// column driving the compare-and-swap

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{SessionStore, StoreError};
use crate::types::Session;

pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteSessionStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let db_path = path.into();
        let conn = Connection::open(&db_path).map_err(backend)?;
        conn.execute_batch(
            "BEGIN;CREATE TABLE IF NOT EXISTS sessions(
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );COMMIT;",
        )
        .map_err(backend)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".to_string()))
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, id: &str) -> Result<Session, StoreError> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row("SELECT payload FROM sessions WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(backend)?;
        match payload {
            Some(p) => serde_json::from_str(&p).map_err(backend),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn save(&self, session: &Session, expected_version: u64) -> Result<u64, StoreError> {
        let mut committed = session.clone();
        committed.version = expected_version + 1;
        let payload = serde_json::to_string(&committed).map_err(backend)?;
        let ts = committed.updated_at.timestamp();

        let mut conn = self.lock()?;
        // The transaction holds the version check and the write together
        let tx = conn.transaction().map_err(backend)?;
        let stored: Option<i64> = tx
            .query_row(
                "SELECT version FROM sessions WHERE id = ?1",
                params![session.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        let actual = stored.unwrap_or(0) as u64;
        if actual != expected_version {
            return Err(StoreError::Conflict {
                id: session.id.clone(),
                expected: expected_version,
                actual,
            });
        }
        tx.execute(
            "INSERT INTO sessions(id, payload, version, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET payload = ?2, version = ?3, updated_at = ?4",
            params![session.id, payload, committed.version as i64, ts],
        )
        .map_err(backend)?;
        tx.commit().map_err(backend)?;
        Ok(committed.version)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])
            .map_err(backend)?;
        if removed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, Session, Stage};
    use tokio::runtime::Runtime;

    fn temp_store() -> (SqliteSessionStore, tempfile::NamedTempFile) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let store = SqliteSessionStore::new(file.path()).unwrap();
        (store, file)
    }

    #[test]
    fn round_trips_the_full_snapshot() {
        let rt = Runtime::new().unwrap();
        let (store, _file) = temp_store();
        let mut session = Session::new("s-1");
        session.stage = Stage::AskPca;
        session.necessity = Some("gestão de frota".to_string());
        session.push_turn(Role::User, "gestão de frota");
        session.answers.insert("pca".to_string(), "sim".to_string());

        rt.block_on(store.save(&session, 0)).unwrap();
        let loaded = rt.block_on(store.load("s-1")).unwrap();
        assert_eq!(loaded.stage, Stage::AskPca);
        assert_eq!(loaded.necessity.as_deref(), Some("gestão de frota"));
        assert_eq!(loaded.answer("pca"), Some("sim"));
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn conflicting_save_leaves_the_row_intact() {
        let rt = Runtime::new().unwrap();
        let (store, _file) = temp_store();
        let mut session = Session::new("s-1");
        rt.block_on(store.save(&session, 0)).unwrap();

        session.necessity = Some("alterado".to_string());
        let err = rt.block_on(store.save(&session, 0)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let loaded = rt.block_on(store.load("s-1")).unwrap();
        assert!(loaded.necessity.is_none());
    }

    #[test]
    fn delete_removes_the_session() {
        let rt = Runtime::new().unwrap();
        let (store, _file) = temp_store();
        let session = Session::new("s-1");
        rt.block_on(store.save(&session, 0)).unwrap();
        rt.block_on(store.delete("s-1")).unwrap();
        assert!(matches!(
            rt.block_on(store.load("s-1")),
            Err(StoreError::NotFound(_))
        ));
    }
}
