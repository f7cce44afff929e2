// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and schema init.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread: `Database` wraps one `Connection`, query modules accept
//! `&Database` and go through `conn.call()`. This is the single writer —
//! do NOT create additional Connection instances for writes. Connection
//! acquisition and release are scoped inside each `call`, so no path can
//! leak a handle, error or not.

use engram_core::EngramError;
use tokio_rusqlite::Connection;
use tracing::debug;

/// Current schema version, stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

/// V1 schema: sessions and turns.
///
/// Embeddings are stored as little-endian f32 BLOBs. At 4096 dimensions no
/// native SQLite vector index applies, so similarity search runs as a
/// sequential scan over candidate rows — a performance concern, not a
/// correctness one.
const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id          TEXT PRIMARY KEY NOT NULL,
    name        TEXT NOT NULL,
    metadata    TEXT,
    created_at  TEXT NOT NULL,
    last_active TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS turns (
    id           TEXT PRIMARY KEY NOT NULL,
    session_id   TEXT NOT NULL REFERENCES sessions(id),
    position     INTEGER NOT NULL,
    role         TEXT NOT NULL,
    content      TEXT NOT NULL,
    embedding    BLOB NOT NULL,
    content_hash TEXT NOT NULL,
    metadata     TEXT,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id, position);
CREATE INDEX IF NOT EXISTS idx_turns_dedup ON turns(session_id, content_hash, created_at);
CREATE INDEX IF NOT EXISTS idx_turns_created ON turns(created_at);
CREATE INDEX IF NOT EXISTS idx_sessions_active ON sessions(last_active);
";

/// Convert tokio-rusqlite errors into `EngramError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> EngramError {
    EngramError::Storage {
        source: Box::new(e),
    }
}

/// Convert bare rusqlite errors (connection open) into `EngramError::Storage`.
pub fn map_sql_err(e: rusqlite::Error) -> EngramError {
    EngramError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the SQLite database, cheap to clone.
///
/// Cloning shares the same underlying background connection, so concurrent
/// callers are serialized rather than contending on SQLITE_BUSY.
#[derive(Clone, Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs and schema.
    pub async fn open(path: &str) -> Result<Self, EngramError> {
        let conn = Connection::open(path).await.map_err(map_sql_err)?;
        let db = Self { conn };
        db.initialize().await?;
        debug!(path, "database opened");
        Ok(db)
    }

    /// Open an in-memory database, for tests.
    pub async fn open_in_memory() -> Result<Self, EngramError> {
        let conn = Connection::open_in_memory().await.map_err(map_sql_err)?;
        let db = Self { conn };
        db.initialize().await?;
        Ok(db)
    }

    /// Access the underlying serialized connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and release the file. Safe to call repeatedly.
    pub async fn close(&self) -> Result<(), EngramError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn initialize(&self) -> Result<(), EngramError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;
                     PRAGMA foreign_keys = ON;",
                )?;

                let version: i64 =
                    conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
                if version < SCHEMA_VERSION {
                    conn.execute_batch(SCHEMA_V1)?;
                    conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
                }
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok::<_, rusqlite::Error>(names)
            })
            .await
            .unwrap();

        assert!(tables.contains(&"sessions".to_string()));
        assert!(tables.contains(&"turns".to_string()));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
        drop(db);

        // Second open applies no migration and succeeds.
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let version: i64 = db
            .connection()
            .call(|conn| {
                Ok::<_, rusqlite::Error>(conn.query_row("PRAGMA user_version", [], |row| {
                    row.get(0)
                })?)
            })
            .await
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_on_a_directory_surfaces_storage_error() {
        let dir = tempdir().unwrap();
        // A directory is not a valid database file.
        let err = Database::open(dir.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, EngramError::Storage { .. }));
    }

    #[tokio::test]
    async fn in_memory_open_works() {
        let db = Database::open_in_memory().await.unwrap();
        db.connection()
            .call(|conn| {
                conn.execute_batch("SELECT 1;")?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .unwrap();
    }
}
