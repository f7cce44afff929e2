// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query profile detection.
//!
//! A coarse keyword heuristic picks one of three profiles, which in turn
//! selects a scoring weight table. Misclassification shifts ranking weights
//! slightly but never drops candidates, so the heuristic stays simple.

use engram_config::{WeightTables, Weights};
use strum::Display;

/// Detected category of an incoming query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum QueryProfile {
    /// Code, APIs, configuration — semantic similarity dominates.
    Technical,
    /// General dialogue — recency and session affinity dominate.
    Conversational,
    /// Troubleshooting — balanced between similarity and recency.
    Diagnostic,
}

const DIAGNOSTIC_MARKERS: &[&str] = &[
    "error", "fail", "failing", "failed", "crash", "crashes", "broken", "bug",
    "debug", "fix", "wrong", "exception", "panic", "stacktrace", "traceback",
];

const TECHNICAL_MARKERS: &[&str] = &[
    "code", "function", "api", "config", "configuration", "compile", "build",
    "deploy", "database", "query", "schema", "server", "endpoint", "token",
    "library", "implement", "syntax", "version", "install", "command",
];

impl QueryProfile {
    /// Detect the profile of a query from its terms.
    ///
    /// Diagnostic markers win over technical ones: "why does the build fail"
    /// is a troubleshooting query even though it mentions the build.
    pub fn detect(query: &str) -> Self {
        let lowered = query.to_lowercase();
        let terms: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        if terms.iter().any(|t| DIAGNOSTIC_MARKERS.contains(t)) {
            QueryProfile::Diagnostic
        } else if terms.iter().any(|t| TECHNICAL_MARKERS.contains(t)) {
            QueryProfile::Technical
        } else {
            QueryProfile::Conversational
        }
    }

    /// The weight table this profile selects.
    pub fn weights(&self, tables: &WeightTables) -> Weights {
        match self {
            QueryProfile::Technical => tables.technical,
            QueryProfile::Conversational => tables.conversational,
            QueryProfile::Diagnostic => tables.diagnostic,
        }
    }
}
