// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cahd`'s own diagnostic log: a single rotating file under the data
//! root, independent of any task's `logs/execution.log`.

use std::path::Path;
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log directory has no parent: {0}")]
    NoParent(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate `daemon.log` -> `.1` -> `.2` -> `.3` if it has grown past
/// [`MAX_LOG_SIZE`]. Best-effort: a failed rotation must not keep the
/// daemon from starting.
pub fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Initialize `tracing` with a non-blocking file writer over
/// `log_path`, filtered by `RUST_LOG` (default `info`). The returned
/// guard must be held for the lifetime of the process — dropping it
/// early truncates buffered log lines.
pub fn init(log_path: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard, LoggingError> {
    let parent = log_path.parent().ok_or_else(|| LoggingError::NoParent(log_path.display().to_string()))?;
    std::fs::create_dir_all(parent)?;

    let file_name = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("daemon.log"));
    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
