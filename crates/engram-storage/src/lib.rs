// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Engram memory engine.
//!
//! Provides WAL-mode SQLite storage with a single-writer concurrency model
//! via `tokio-rusqlite`, transactional turn writes with content-hash dedup,
//! and a sequential-scan cosine similarity search over stored embeddings.

pub mod database;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
pub use queries::turns::SaveOutcome;
