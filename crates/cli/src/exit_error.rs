// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wraps an exit code alongside the user-facing message so `main`'s
//! top-level error handler can recover it from an `anyhow::Error` chain.

use cah_core::exit_code;
use cah_storage::TaskLookupError;
use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

/// Map a task id lookup failure onto the CLI's `NotFound`/`Ambiguous`
/// exit codes.
pub fn from_lookup(err: TaskLookupError) -> anyhow::Error {
    let code = match &err {
        TaskLookupError::NotFound(_) => exit_code::NOT_FOUND,
        TaskLookupError::Ambiguous { .. } => exit_code::AMBIGUOUS,
    };
    ExitError::new(code, err.to_string()).into()
}

/// Map a [`cah_core::CoreError`] onto its own exit code.
pub fn from_core(err: cah_core::CoreError) -> anyhow::Error {
    ExitError::new(err.exit_code(), err.to_string()).into()
}
