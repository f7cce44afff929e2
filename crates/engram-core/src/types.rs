// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Engram workspace.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Unique identifier for a turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub String);

/// Role of the speaker in a turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged exchange unit within a session.
///
/// A turn's embedding is immutable once written, and a turn is never
/// partially persisted: text and embedding land in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique identifier for this turn.
    pub id: String,
    /// Session this turn belongs to.
    pub session_id: String,
    /// Ordinal position within the session, starting at 0.
    pub position: i64,
    /// Who produced this turn.
    pub role: Role,
    /// The raw text content.
    pub content: String,
    /// Embedding vector for semantic search (deployment-fixed dimension).
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// Hex SHA-256 of the normalized content, used for dedup.
    pub content_hash: String,
    /// Free-form metadata attached by the caller.
    pub metadata: Option<serde_json::Value>,
    /// ISO 8601 creation timestamp (UTC).
    pub created_at: String,
}

/// A logical conversation thread grouping ordered turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form metadata.
    pub metadata: Option<serde_json::Value>,
    /// ISO 8601 creation timestamp (UTC).
    pub created_at: String,
    /// ISO 8601 timestamp of the most recent turn write. Monotonically
    /// non-decreasing.
    pub last_active: String,
}

/// A single chat message sent to a completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// A request to a chat-style completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// The generated text returned by a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
}

/// Current UTC time as an ISO 8601 millisecond string.
///
/// The format sorts lexicographically, which the storage layer relies on for
/// the monotonic `last_active` upsert and the dedup window cutoff.
pub fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Hex SHA-256 over whitespace-normalized, lowercased text.
///
/// Normalization collapses runs of whitespace so trivially reformatted
/// duplicates hash identically.
pub fn content_hash(text: &str) -> String {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-norm inputs rather than
/// panicking, since stored rows may predate a dimension change.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
