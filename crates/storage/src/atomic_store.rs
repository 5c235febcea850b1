// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed read/write of JSON files with write-temp-then-rename (C2).
//!
//! No locking happens here; callers coordinate via [`crate::FileLock`].
//! `read_json` never hard-fails on missing or malformed data: it always
//! falls back to a caller-supplied default and logs a warning, per the
//! `CorruptJSON` error-handling policy.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_err(path: &Path, source: serde_json::Error) -> StoreError {
    StoreError::Json {
        path: path.display().to_string(),
        source,
    }
}

/// Read a typed JSON document. Returns `default` (possibly `None`) when
/// the file is missing or fails to parse — callers never see a panic
/// or propagated error from stray bytes on disk.
pub fn read_json<T: DeserializeOwned>(path: &Path, default: Option<T>) -> Option<T> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return default,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to open JSON file, using default");
            return default;
        }
    };
    let reader = BufReader::new(file);
    match serde_json::from_reader(reader) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt JSON, using default");
            default
        }
    }
}

/// Read a typed JSON document, running `validate` on success and
/// falling back to `default` if validation fails.
pub fn read_json_validated<T: DeserializeOwned>(
    path: &Path,
    default: Option<T>,
    validate: impl FnOnce(&T) -> bool,
) -> Option<T> {
    match read_json::<T>(path, None) {
        Some(value) if validate(&value) => Some(value),
        Some(_) => {
            warn!(path = %path.display(), "JSON failed validation, using default");
            default
        }
        None => default,
    }
}

pub fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path).map_err(|e| io_err(path, e))
}

/// Write a typed JSON document. When `atomic` (the default via
/// [`write_json`]), writes to `path.tmp` and renames into place in a
/// single syscall: a crash mid-write leaves either the previous
/// content or nothing at `path`, never a half-written file.
pub fn write_json_opts<T: Serialize>(
    path: &Path,
    value: &T,
    atomic: bool,
    indent: usize,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let write_to = |target: &Path| -> Result<(), StoreError> {
        let file = File::create(target).map_err(|e| io_err(target, e))?;
        let mut writer = BufWriter::new(file);
        if indent == 0 {
            serde_json::to_writer(&mut writer, value).map_err(|e| json_err(target, e))?;
        } else {
            let buf = serde_json::to_vec_pretty(value).map_err(|e| json_err(target, e))?;
            writer.write_all(&buf).map_err(|e| io_err(target, e))?;
        }
        writer.flush().map_err(|e| io_err(target, e))?;
        let file = writer.into_inner().map_err(|e| io_err(target, e.into_error()))?;
        file.sync_all().map_err(|e| io_err(target, e))?;
        Ok(())
    };

    if atomic {
        let tmp_path = path.with_extension(match path.extension() {
            Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
            None => "tmp".to_string(),
        });
        write_to(&tmp_path)?;
        fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
    } else {
        write_to(path)?;
    }
    Ok(())
}

/// Write with the default policy: atomic, 2-space indent.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    write_json_opts(path, value, true, 2)
}

/// Append a line of text to a file, creating it (and parent dirs) if needed.
pub fn append_to_file(path: &Path, line: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    writeln!(file, "{line}").map_err(|e| io_err(path, e))?;
    Ok(())
}

#[cfg(test)]
#[path = "atomic_store_tests.rs"]
mod tests;
