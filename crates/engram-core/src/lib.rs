// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Engram memory engine.
//!
//! This crate provides the error taxonomy, domain types (turns, sessions,
//! completion messages), and the provider traits every external dependency
//! is reached through. All other Engram crates build on it.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::EngramError;
pub use traits::{CompletionProvider, EmbeddingProvider};
pub use types::{Role, Session, SessionId, Turn, TurnId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_construct() {
        let _config = EngramError::Config("test".into());
        let _input = EngramError::InvalidInput("test".into());
        let _storage = EngramError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _transient = EngramError::transient("test");
        let _permanent = EngramError::permanent("test");
        let _open = EngramError::CircuitOpen {
            dependency: "database".into(),
        };
        let _deadline = EngramError::DeadlineExceeded {
            deadline: std::time::Duration::from_secs(30),
        };
        let _internal = EngramError::Internal("test".into());
    }

    #[test]
    fn turn_serializes_without_embedding() {
        let turn = Turn {
            id: "t-1".into(),
            session_id: "s-1".into(),
            position: 0,
            role: Role::User,
            content: "hello".into(),
            embedding: vec![0.1; 8],
            content_hash: types::content_hash("hello"),
            metadata: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let json = serde_json::to_string(&turn).unwrap();
        assert!(!json.contains("embedding"), "embedding must not serialize");
        assert!(json.contains("\"role\":\"user\""));
    }
}
