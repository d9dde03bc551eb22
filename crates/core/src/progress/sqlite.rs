use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{ProgressRecord, ProgressStore, StoreError};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS batch_progress (
        batch_id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        updated_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_batch_progress_expires_at ON batch_progress(expires_at);
"#;

/// SQLite-backed progress store.
///
/// Any process opening the same database file sees the same records.
pub struct SqliteProgressStore {
    conn: Mutex<Connection>,
}

impl SqliteProgressStore {
    /// Open (or create) the store at `path`.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(unavailable)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
            .map_err(unavailable)?;
        Self::with_connection(conn)
    }

    /// In-memory store, useful for testing.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(unavailable)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))
    }
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

impl ProgressStore for SqliteProgressStore {
    fn put(&self, record: &ProgressRecord, ttl: Duration) -> Result<(), StoreError> {
        let data = serde_json::to_string(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let now = Utc::now().timestamp_millis();
        let expires_at = now + ttl.as_millis() as i64;

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO batch_progress (batch_id, data, updated_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(batch_id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at
            "#,
            params![record.batch_id, data, now, expires_at],
        )
        .map_err(unavailable)?;

        Ok(())
    }

    fn get(&self, batch_id: &str) -> Result<Option<ProgressRecord>, StoreError> {
        let now = Utc::now().timestamp_millis();
        let conn = self.lock()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM batch_progress WHERE batch_id = ?1 AND expires_at > ?2",
                params![batch_id, now],
                |row| row.get(0),
            )
            .optional()
            .map_err(unavailable)?;

        data.map(|json| {
            serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string()))
        })
        .transpose()
    }

    fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Utc::now().timestamp_millis();
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM batch_progress WHERE expires_at <= ?1",
            params![now],
        )
        .map_err(unavailable)
    }
}
