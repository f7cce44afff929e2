// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD operations.
//!
//! Sessions are normally created implicitly by the first turn write; the
//! explicit `create_session` path exists for callers that want a display
//! name or metadata up front. Sessions are never auto-deleted — only
//! `purge_session` removes one, together with its turns, in one transaction.

use engram_core::EngramError;
use engram_core::types::Session;
use rusqlite::params;
use tracing::info;

use crate::database::{Database, map_tr_err};

/// Create a session explicitly.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), EngramError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, name, metadata, created_at, last_active)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session.id,
                    session.name,
                    session.metadata.as_ref().map(|v| v.to_string()),
                    session.created_at,
                    session.last_active,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a session by id.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, EngramError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, name, metadata, created_at, last_active
                 FROM sessions WHERE id = ?1",
                params![id],
                |row| row_to_session(row),
            );
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List all sessions, most recently active first.
pub async fn list_sessions(db: &Database) -> Result<Vec<Session>, EngramError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, metadata, created_at, last_active
                 FROM sessions ORDER BY last_active DESC",
            )?;
            let mut sessions = Vec::new();
            let rows = stmt.query_map([], |row| row_to_session(row))?;
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a session and all of its turns in one transaction.
///
/// Returns the number of turns removed. This is the only deletion path for
/// stored turns.
pub async fn purge_session(db: &Database, id: &str) -> Result<i64, EngramError> {
    let session_id = id.to_string();
    let id = session_id.clone();
    let removed = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed =
                tx.execute("DELETE FROM turns WHERE session_id = ?1", params![id])? as i64;
            tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(removed)
        })
        .await
        .map_err(map_tr_err)?;
    info!(session_id = %session_id, removed, "session purged");
    Ok(removed)
}

/// Convert a rusqlite Row to a Session.
fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let metadata_str: Option<String> = row.get(2)?;
    Ok(Session {
        id: row.get(0)?,
        name: row.get(1)?,
        metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(3)?,
        last_active: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::types::now_iso;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn make_session(id: &str) -> Session {
        let now = now_iso();
        Session {
            id: id.to_string(),
            name: format!("session {id}"),
            metadata: None,
            created_at: now.clone(),
            last_active: now,
        }
    }

    #[tokio::test]
    async fn create_and_get_roundtrips() {
        let db = setup_db().await;
        let session = make_session("sess-1");
        create_session(&db, &session).await.unwrap();

        let retrieved = get_session(&db, "sess-1").await.unwrap().unwrap();
        assert_eq!(retrieved.id, "sess-1");
        assert_eq!(retrieved.name, "session sess-1");
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let db = setup_db().await;
        assert!(get_session(&db, "no-such").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_orders_by_last_active() {
        let db = setup_db().await;
        let mut stale = make_session("stale");
        stale.last_active = "2026-01-01T00:00:00.000Z".to_string();
        let mut fresh = make_session("fresh");
        fresh.last_active = "2026-06-01T00:00:00.000Z".to_string();

        create_session(&db, &stale).await.unwrap();
        create_session(&db, &fresh).await.unwrap();

        let sessions = list_sessions(&db).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "fresh");
        assert_eq!(sessions[1].id, "stale");
    }

    #[tokio::test]
    async fn purge_removes_session_and_turns() {
        use engram_core::types::{Role, Turn, content_hash};

        let db = setup_db().await;
        let turn = Turn {
            id: "t1".into(),
            session_id: "doomed".into(),
            position: 0,
            role: Role::User,
            content: "to be purged".into(),
            embedding: vec![1.0, 0.0],
            content_hash: content_hash("to be purged"),
            metadata: None,
            created_at: now_iso(),
        };
        crate::queries::turns::save_turn(&db, &turn, std::time::Duration::from_secs(60))
            .await
            .unwrap();

        let removed = purge_session(&db, "doomed").await.unwrap();
        assert_eq!(removed, 1);
        assert!(get_session(&db, "doomed").await.unwrap().is_none());
        assert_eq!(
            crate::queries::turns::count_turns(&db, "doomed").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn purge_unknown_session_is_noop() {
        let db = setup_db().await;
        assert_eq!(purge_session(&db, "missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn metadata_roundtrips() {
        let db = setup_db().await;
        let mut session = make_session("meta");
        session.metadata = Some(serde_json::json!({"owner": "cli"}));
        create_session(&db, &session).await.unwrap();

        let retrieved = get_session(&db, "meta").await.unwrap().unwrap();
        assert_eq!(retrieved.metadata.unwrap()["owner"], "cli");
    }
}
