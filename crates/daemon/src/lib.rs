// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cah-daemon: the runner process (C11 TaskSpawner/RunnerLock, C12
//! OrphanRecovery) and the `cahd` binary that drains the task queue.
//!
//! A runner is a detached subprocess, not a long-lived service, unless
//! started with `--persistent` (the `cah daemon start` path): it
//! acquires `runner.lock`, drains every eligible task, and exits.

pub mod logging;
pub mod orphan;
pub mod runner;

pub use orphan::{process_is_alive, recover_orphans, OrphanReport};
pub use runner::{spawn_detached, spawn_persistent, RunnerConfig, RunnerError};
