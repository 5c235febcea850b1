// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds shared across the workspace.
//!
//! These are the "kinds, not types" named in the design: each downstream
//! crate wraps its own `thiserror` enum around the ones relevant to it,
//! but the discriminants and their user-facing meaning live here so the
//! CLI can map any of them to one of the exit codes in the external
//! interface without re-deriving the mapping per crate.

use thiserror::Error;

/// Exit codes the CLI maps every [`CoreError`] onto.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERIC_FAILURE: i32 = 1;
    pub const USAGE_ERROR: i32 = 2;
    pub const NOT_FOUND: i32 = 3;
    pub const AMBIGUOUS: i32 = 4;
    pub const LOCK_HELD: i32 = 5;
}

/// Coarse failure classification for node handler errors, used to decide
/// whether a job retries, fails permanently, or is treated as an unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network-like, rate-limited, or transient 5xx: retry with backoff.
    Transient,
    /// Recoverable with a different strategy; still retried like transient.
    Recoverable,
    /// Validation or permission failure: never retried.
    Permanent,
    /// Unclassified: retried up to the configured max attempts.
    Unknown,
}

impl ErrorCategory {
    /// Whether a job in this category should be retried by the queue.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorCategory::Permanent)
    }
}

/// Errors common to core data model operations: state transitions,
/// lookups, and workflow graph construction.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous prefix '{prefix}' matches: {matches:?}")]
    AmbiguousPrefix { prefix: String, matches: Vec<String> },

    #[error("invalid state transition: {entity} cannot go from {from} to {to}")]
    InvalidStateTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("lock busy: {0}")]
    LockBusy(String),

    #[error("backend timed out after {0}ms")]
    BackendTimeout(u64),

    #[error("backend invocation cancelled")]
    BackendCancelled,

    #[error("backend process error (exit code {0:?})")]
    BackendProcess(Option<i32>),

    #[error("graph invariant violation: {0}")]
    GraphInvariantViolation(String),

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),
}

impl CoreError {
    /// Map to the CLI's stable exit code table.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::NotFound(_) => exit_code::NOT_FOUND,
            CoreError::AmbiguousPrefix { .. } => exit_code::AMBIGUOUS,
            CoreError::LockBusy(_) => exit_code::LOCK_HELD,
            CoreError::InvalidStateTransition { .. } => exit_code::USAGE_ERROR,
            _ => exit_code::GENERIC_FAILURE,
        }
    }
}
