// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cah-storage: the on-disk persistence layer (C1 PathLayout, C2
//! AtomicJSONStore, C3 FileLock, C4 TaskStore). Every other crate that
//! touches disk goes through here rather than constructing paths or
//! handling locking ad-hoc.

pub mod atomic_store;
pub mod file_lock;
pub mod layout;
pub mod task_store;

pub use atomic_store::{append_to_file, ensure_dir, read_json, read_json_validated, write_json, write_json_opts, StoreError};
pub use file_lock::{FileLock, LockError};
pub use layout::{resolve_data_root, PathLayout};
pub use task_store::{TaskLookupError, TaskStore};
