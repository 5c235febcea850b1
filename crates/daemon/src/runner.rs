// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TaskSpawner / RunnerLock (C11): the detached subprocess that drains
//! the task queue, one project (`cwd`) at a time, until nothing
//! eligible remains — or, in `--persistent` mode, forever.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cah_core::clock::Clock;
use cah_core::process_info::ProcessInfo;
use cah_core::task::{TaskId, TaskStatus};
use cah_engine::{ExecuteOptions, TaskExecutor};
use cah_storage::{FileLock, LockError, PathLayout, StoreError, TaskStore};
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

const IDLE_POLL: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to acquire runner.lock: {0}")]
    Lock(#[from] LockError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] cah_queue::QueueError),
    #[error(transparent)]
    Engine(#[from] cah_engine::EngineError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub data_root: PathBuf,
    pub concurrency: usize,
    /// `cah daemon start`'s mode: loop forever, sleeping when the
    /// queue is empty, instead of exiting once drained.
    pub persistent: bool,
}

/// Launch a detached `cahd` subprocess. `resume_task` is set when this
/// spawn exists specifically to recover one orphaned task (C12); the
/// spawned process resumes that task first, then falls into the same
/// drain loop as any other runner. stdout/stderr are redirected to
/// that task's `execution.log` when known, otherwise discarded — there
/// is no single task to attribute a bare queue-drain run to.
pub fn spawn_detached(data_root: &Path, resume_task: Option<&TaskId>) -> Result<u32, RunnerError> {
    let binary = find_cahd_binary();
    let mut cmd = std::process::Command::new(&binary);
    cmd.env("CAH_DATA_DIR", data_root).stdin(Stdio::null());

    if let Some(task_id) = resume_task {
        cmd.arg("--resume").arg(task_id.as_str());
        let layout = PathLayout::new(data_root);
        let log_path = layout.execution_log(task_id);
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log = std::fs::OpenOptions::new().create(true).append(true).open(&log_path)?;
        cmd.stdout(Stdio::from(log.try_clone()?)).stderr(Stdio::from(log));
    } else {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }

    // New process group so a signal sent to this CLI invocation (or its
    // parent shell) does not also reach the detached runner.
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn()?;
    Ok(child.id())
}

/// Launch a detached, persistent `cahd --persistent` subprocess for
/// `cah daemon start`: it loops forever instead of exiting once the
/// queue drains. stdout/stderr go to `daemon.log` via the process's
/// own `logging::init`, so nothing is redirected here.
pub fn spawn_persistent(data_root: &Path) -> Result<u32, RunnerError> {
    let binary = find_cahd_binary();
    let mut cmd = std::process::Command::new(&binary);
    cmd.env("CAH_DATA_DIR", data_root).arg("--persistent").stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn()?;
    Ok(child.id())
}

/// Find the `cahd` binary: an explicit override, then (debug builds
/// only) the workspace's own `target/debug/cahd`, then a binary next
/// to the currently running executable, then bare `cahd` on `PATH`.
fn find_cahd_binary() -> PathBuf {
    if let Ok(path) = std::env::var("CAH_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    let current_exe = std::env::current_exe().ok();
    let is_debug_build = current_exe.as_ref().and_then(|p| p.to_str()).map(|s| s.contains("target/debug")).unwrap_or(false);

    if is_debug_build {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let dev_path = PathBuf::from(manifest_dir).parent().and_then(|p| p.parent()).map(|p| p.join("target/debug/cahd"));
            if let Some(path) = dev_path {
                if path.exists() {
                    return path;
                }
            }
        }
    }

    if let Some(exe) = &current_exe {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("cahd");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    PathBuf::from("cahd")
}

/// Acquire `runner.lock` and drive the drain loop to completion,
/// releasing the lock (via [`FileLock`]'s `Drop`) no matter how the
/// loop ends — including a `SIGINT`/`SIGTERM` observed between
/// iterations.
pub async fn drain_queue(
    store: Arc<TaskStore>,
    executor: Arc<TaskExecutor>,
    clock: Arc<dyn Clock>,
    resume_first: Option<TaskId>,
    cfg: RunnerConfig,
) -> Result<(), RunnerError> {
    let lock_path = store.layout().runner_lock();
    let lock = FileLock::acquire_with_retry(&lock_path, 10, Duration::from_millis(100))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_shutdown_listener(shutdown.clone());

    let result = run_drain_loop(store, executor, clock, resume_first, &cfg, &shutdown).await;
    lock.release();
    result
}

#[cfg(unix)]
fn spawn_shutdown_listener(shutdown: Arc<AtomicBool>) {
    use tokio::signal::unix::{signal, SignalKind};
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGINT handler");
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, will release runner.lock and exit between tasks"),
            _ = sigint.recv() => tracing::info!("received SIGINT, will release runner.lock and exit between tasks"),
        }
        shutdown.store(true, Ordering::SeqCst);
    });
}

#[cfg(not(unix))]
fn spawn_shutdown_listener(_shutdown: Arc<AtomicBool>) {}

async fn run_drain_loop(
    store: Arc<TaskStore>,
    executor: Arc<TaskExecutor>,
    clock: Arc<dyn Clock>,
    resume_first: Option<TaskId>,
    cfg: &RunnerConfig,
    shutdown: &AtomicBool,
) -> Result<(), RunnerError> {
    if let Some(task_id) = resume_first {
        if let Some(task) = store.read_task(&task_id) {
            run_one(&store, &executor, &clock, task, true, cfg.concurrency).await;
        } else {
            tracing::warn!(task_id = %task_id, "runner asked to resume a task that no longer exists");
        }
    }

    loop {
        if shutdown.load(Ordering::SeqCst) {
            tracing::info!("runner shutting down, queue not fully drained");
            break;
        }

        match next_eligible_task(&store) {
            Some(task) => run_one(&store, &executor, &clock, task, false, cfg.concurrency).await,
            None => {
                if !cfg.persistent {
                    break;
                }
                tokio::time::sleep(IDLE_POLL).await;
            }
        }
    }

    Ok(())
}

/// The first `pending` task whose `cwd` is not already claimed by a
/// task currently in the running set — same-project serialization.
fn next_eligible_task(store: &TaskStore) -> Option<cah_core::Task> {
    let tasks = store.list_tasks();
    let running_cwds: HashSet<&std::path::Path> = tasks.iter().filter(|t| t.status.is_running()).map(|t| t.cwd.as_path()).collect();
    tasks.into_iter().find(|t| t.status == TaskStatus::Pending && !running_cwds.contains(t.cwd.as_path()))
}

async fn run_one(store: &Arc<TaskStore>, executor: &Arc<TaskExecutor>, clock: &Arc<dyn Clock>, task: cah_core::Task, resume: bool, concurrency: usize) {
    if let Err(e) = store.write_process_info(&task.id, &ProcessInfo::new_running(std::process::id(), clock.now_ms())) {
        tracing::warn!(task_id = %task.id, error = %e, "failed to write process.json for picked-up task");
    }
    let task_id = task.id.clone();
    let opts = ExecuteOptions { concurrency, resume };
    if let Err(e) = executor.clone().execute_task(task, opts).await {
        tracing::error!(task_id = %task_id, error = %e, "task execution failed");
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
