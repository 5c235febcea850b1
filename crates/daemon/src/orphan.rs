// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OrphanRecovery (C12): find tasks stuck in a running status whose
//! owning process is gone, so a new runner can pick them back up.

use cah_core::task::{TaskId, TaskStatus};
use cah_storage::TaskStore;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Tasks found with status in the running set (`planning`, `developing`,
/// `reviewing`) whose recorded PID no longer exists.
#[derive(Debug, Default, Clone)]
pub struct OrphanReport {
    pub orphaned: Vec<TaskId>,
}

/// Scan every task for orphaned work. A task with no `process.json` is
/// never flagged — the runner only writes it at pickup time, so a task
/// that transitioned to `planning` moments ago and hasn't been picked
/// up yet must not be mistaken for an orphan.
pub fn recover_orphans(store: &TaskStore) -> OrphanReport {
    let mut report = OrphanReport::default();
    for task in store.list_tasks() {
        if !task.status.is_running() {
            continue;
        }
        let Some(info) = store.read_process_info(&task.id) else {
            continue;
        };
        if !process_is_alive(info.pid) {
            tracing::warn!(task_id = %task.id, pid = info.pid, status = ?task.status, "orphaned task: owning process is gone");
            report.orphaned.push(task.id);
        }
    }
    report
}

/// Liveness check via `kill(pid, 0)`: `ESRCH` means no such process
/// ever existed or it has exited; any other error (most commonly
/// `EPERM`, the PID was recycled by a process we don't own) means a
/// process is sitting at that PID, so we conservatively treat it as
/// still alive rather than risk declaring a foreign process dead.
///
/// Exposed for `cah daemon status`, which runs the same check against
/// `runner.lock`'s recorded PID as a read-only liveness query.
pub fn process_is_alive(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(_) => true,
    }
}

#[cfg(test)]
#[path = "orphan_tests.rs"]
mod tests;
