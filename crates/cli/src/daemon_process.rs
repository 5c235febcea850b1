// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon process management: start/stop/status for the persistent
//! `cahd --persistent` process behind `cah daemon`.
//!
//! Actual spawning is delegated to `cah_daemon::runner` so the
//! detachment/binary-discovery logic lives in one place; this module
//! only adds the stop/status half, which the runner crate has no
//! reason to own (it never stops itself from the outside).

use std::time::{Duration, Instant};

use cah_daemon::process_is_alive;
use cah_storage::{FileLock, PathLayout};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

const STOP_POLL: Duration = Duration::from_millis(100);
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// PID currently holding `runner.lock`, if the lockfile exists at all.
pub fn running_pid(layout: &PathLayout) -> Option<u32> {
    FileLock::read_holder_pid(&layout.runner_lock())
}

/// Whether a `cahd` process is both recorded in `runner.lock` and
/// actually alive (as opposed to a stale lockfile left by a crash).
pub fn is_running(layout: &PathLayout) -> Option<u32> {
    let pid = running_pid(layout)?;
    process_is_alive(pid).then_some(pid)
}

/// SIGTERM the recorded runner, then poll `runner.lock`'s PID until it
/// is gone or `STOP_TIMEOUT` elapses. Returns whether it stopped.
pub fn stop(layout: &PathLayout) -> bool {
    let Some(pid) = running_pid(layout) else {
        return true;
    };
    if !process_is_alive(pid) {
        return true;
    }

    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);

    let start = Instant::now();
    while start.elapsed() < STOP_TIMEOUT {
        if !process_is_alive(pid) {
            return true;
        }
        std::thread::sleep(STOP_POLL);
    }
    false
}
