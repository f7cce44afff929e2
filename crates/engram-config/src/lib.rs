// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Engram memory engine.
//!
//! Provides the serde config model with documented defaults and a
//! Figment-based layered loader (TOML files + `ENGRAM_` env overrides).

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    EmbeddingConfig, EngramConfig, FusionConfig, ResilienceConfig, RetrievalConfig,
    StorageConfig, WeightTables, Weights, validate,
};
