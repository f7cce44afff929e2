// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn persistence and similarity search.
//!
//! `save_turn` is the transactional write path: the session `last_active`
//! upsert and the turn insert commit or roll back together, so no reader
//! ever observes a turn without its embedding or a turn without its session.
//! Dedup is enforced here at the store boundary via a conditional insert on
//! the indexed `(session_id, content_hash)` pair, not in application logic.

use std::time::Duration;

use engram_core::EngramError;
use engram_core::types::{Role, Turn, TurnId, blob_to_vec, cosine_similarity, vec_to_blob};
use rusqlite::params;
use tracing::debug;

use crate::database::{Database, map_tr_err};

/// Result of a `save_turn` call.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    /// Id of the inserted turn, or of the existing duplicate.
    pub turn_id: TurnId,
    /// True when an identical `(session, content_hash)` row already existed
    /// within the dedup window and no new row was inserted.
    pub deduplicated: bool,
}

/// Persist one turn atomically, creating its session on first reference.
///
/// Within `dedup_window`, a second write with the same normalized content to
/// the same session is silently deduplicated and returns the existing id.
pub async fn save_turn(
    db: &Database,
    turn: &Turn,
    dedup_window: Duration,
) -> Result<SaveOutcome, EngramError> {
    let turn = turn.clone();
    let cutoff = (chrono::Utc::now()
        - chrono::Duration::seconds(dedup_window.as_secs() as i64))
    .format("%Y-%m-%dT%H:%M:%S%.3fZ")
    .to_string();

    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            // Conditional insert: an identical recent write short-circuits
            // before any row is touched.
            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM turns
                     WHERE session_id = ?1 AND content_hash = ?2 AND created_at >= ?3
                     ORDER BY created_at DESC LIMIT 1",
                    params![turn.session_id, turn.content_hash, cutoff],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            if let Some(id) = existing {
                return Ok(SaveOutcome {
                    turn_id: TurnId(id),
                    deduplicated: true,
                });
            }

            // Upsert the session. MAX on ISO strings keeps last_active
            // monotonic under concurrent writers.
            tx.execute(
                "INSERT INTO sessions (id, name, metadata, created_at, last_active)
                 VALUES (?1, ?1, NULL, ?2, ?2)
                 ON CONFLICT(id) DO UPDATE
                 SET last_active = MAX(last_active, excluded.last_active)",
                params![turn.session_id, turn.created_at],
            )?;

            let position: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position), -1) + 1 FROM turns WHERE session_id = ?1",
                params![turn.session_id],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO turns
                 (id, session_id, position, role, content, embedding, content_hash, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    turn.id,
                    turn.session_id,
                    position,
                    turn.role.as_str(),
                    turn.content,
                    vec_to_blob(&turn.embedding),
                    turn.content_hash,
                    turn.metadata.as_ref().map(|v| v.to_string()),
                    turn.created_at,
                ],
            )?;

            tx.commit()?;
            Ok(SaveOutcome {
                turn_id: TurnId(turn.id.clone()),
                deduplicated: false,
            })
        })
        .await
        .map_err(map_tr_err)?;

    if outcome.deduplicated {
        debug!(turn_id = %outcome.turn_id.0, "duplicate turn within dedup window, not re-inserted");
    }
    Ok(outcome)
}

/// Similarity search over stored turns.
///
/// Runs a sequential scan: at 4096 dimensions SQLite carries no usable
/// vector index, so every candidate row's embedding is compared in memory.
/// Returns up to `limit` turns with clamped cosine similarity in [0, 1],
/// ordered most-similar first with more-recent-first tie breaks.
pub async fn search(
    db: &Database,
    query_vector: &[f32],
    session_filter: Option<&str>,
    limit: usize,
    threshold: f32,
) -> Result<Vec<(Turn, f32)>, EngramError> {
    let query_vector = query_vector.to_vec();
    let session_filter = session_filter.map(|s| s.to_string());

    let mut scored = db
        .connection()
        .call(move |conn| {
            let sql = match &session_filter {
                Some(_) => {
                    "SELECT id, session_id, position, role, content, embedding, content_hash, metadata, created_at
                     FROM turns WHERE session_id = ?1"
                }
                None => {
                    "SELECT id, session_id, position, role, content, embedding, content_hash, metadata, created_at
                     FROM turns"
                }
            };
            let mut stmt = conn.prepare(sql)?;

            let map_row = |row: &rusqlite::Row<'_>| row_to_turn(row);
            let rows: Vec<Turn> = match &session_filter {
                Some(sid) => stmt
                    .query_map(params![sid], map_row)?
                    .collect::<Result<_, _>>()?,
                None => stmt.query_map([], map_row)?.collect::<Result<_, _>>()?,
            };

            let scored: Vec<(Turn, f32)> = rows
                .into_iter()
                .filter_map(|turn| {
                    let sim =
                        cosine_similarity(&query_vector, &turn.embedding).clamp(0.0, 1.0);
                    if sim >= threshold { Some((turn, sim)) } else { None }
                })
                .collect();
            Ok(scored)
        })
        .await
        .map_err(map_tr_err)?;

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.0.created_at.cmp(&a.0.created_at))
    });
    scored.truncate(limit);
    Ok(scored)
}

/// Get a session's turns in positional order.
pub async fn get_turns_for_session(
    db: &Database,
    session_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Turn>, EngramError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut turns = Vec::new();
            match limit {
                Some(lim) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, position, role, content, embedding, content_hash, metadata, created_at
                         FROM turns WHERE session_id = ?1 ORDER BY position ASC LIMIT ?2",
                    )?;
                    let rows = stmt.query_map(params![session_id, lim], |row| row_to_turn(row))?;
                    for row in rows {
                        turns.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, position, role, content, embedding, content_hash, metadata, created_at
                         FROM turns WHERE session_id = ?1 ORDER BY position ASC",
                    )?;
                    let rows = stmt.query_map(params![session_id], |row| row_to_turn(row))?;
                    for row in rows {
                        turns.push(row?);
                    }
                }
            }
            Ok(turns)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of turns stored for a session.
pub async fn count_turns(db: &Database, session_id: &str) -> Result<i64, EngramError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM turns WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)
}

/// Convert a rusqlite Row to a Turn.
///
/// An unrecognized `role` value means the row is corrupt; surface it as a
/// conversion error rather than guessing a speaker.
fn row_to_turn(row: &rusqlite::Row<'_>) -> rusqlite::Result<Turn> {
    let role_str: String = row.get(3)?;
    let embedding_blob: Vec<u8> = row.get(5)?;
    let metadata_str: Option<String> = row.get(7)?;

    Ok(Turn {
        id: row.get(0)?,
        session_id: row.get(1)?,
        position: row.get(2)?,
        role: role_str.parse::<Role>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        content: row.get(4)?,
        embedding: blob_to_vec(&embedding_blob),
        content_hash: row.get(6)?,
        metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(8)?,
    })
}
