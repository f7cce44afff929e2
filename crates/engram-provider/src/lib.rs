// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP clients for the Engram memory engine's external providers.
//!
//! Each client performs exactly one request per call and classifies failures
//! as transient or permanent. Retry and circuit-breaking policy live in
//! `engram-resilience`, above these clients.

pub mod chat;
pub mod client;
pub mod embeddings;
pub mod types;

pub use chat::RemoteCompleter;
pub use embeddings::RemoteEmbedder;
