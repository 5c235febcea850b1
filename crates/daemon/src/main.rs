// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cahd - the runner process that drains the task queue (C11/C12).
//!
//! Normally spawned detached by `cah submit`/`cah resume`, not run
//! interactively. `cah daemon start` spawns it with `--persistent` so
//! it keeps running instead of exiting once the queue is drained.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use cah_adapters::{BackendRegistry, SubprocessBackendAdapter};
use cah_core::clock::{Clock, SystemClock};
use cah_core::task::TaskId;
use cah_daemon::{orphan, runner};
use cah_engine::event_bus::run_timeline_writer;
use cah_engine::{BackendPlanner, TaskEventBus, TaskExecutor};
use cah_queue::WorkflowQueue;
use cah_storage::{resolve_data_root, PathLayout, TaskStore};
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "cahd", version, about = "cah runner process")]
struct Args {
    /// Keep looping after the queue drains instead of exiting, sleeping
    /// between polls. Used by `cah daemon start`.
    #[arg(long)]
    persistent: bool,

    /// Resume one specific task before joining the normal drain loop.
    /// Set by orphan recovery when it respawns a runner for an
    /// interrupted task.
    #[arg(long, value_name = "TASK_ID")]
    resume: Option<String>,

    /// Node worker concurrency within a task (default 3, per §5).
    #[arg(long)]
    concurrency: Option<usize>,
}

fn build_backend_registry() -> BackendRegistry {
    let program = std::env::var("CAH_BACKEND_PROGRAM").unwrap_or_else(|_| "claude".to_string());
    let args: Vec<String> = std::env::var("CAH_BACKEND_ARGS")
        .map(|raw| raw.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    let adapter = Arc::new(SubprocessBackendAdapter::new("claude", program, args));
    BackendRegistry::new().register(adapter).with_default("claude")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let data_root = resolve_data_root(None);
    if let Err(e) = std::fs::create_dir_all(&data_root) {
        eprintln!("cahd: failed to create data root {}: {e}", data_root.display());
        std::process::exit(1);
    }
    let layout = PathLayout::new(&data_root);

    let daemon_log = layout.root().join("daemon.log");
    cah_daemon::logging::rotate_log_if_needed(&daemon_log);
    let _log_guard = match cah_daemon::logging::init(&daemon_log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("cahd: failed to set up logging: {e}");
            std::process::exit(1);
        }
    };

    info!(pid = std::process::id(), persistent = args.persistent, "cahd starting");

    let store = Arc::new(TaskStore::new(layout.clone()));
    let queue = Arc::new(WorkflowQueue::new(layout.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let bus = TaskEventBus::new(1024);
    tokio::spawn(run_timeline_writer(bus.clone(), store.clone(), clock.clone()));

    let backends = build_backend_registry();
    let executor = Arc::new(TaskExecutor::new(store.clone(), queue.clone(), backends, Arc::new(BackendPlanner::new()), bus, clock.clone()));

    let resume_first = args.resume.map(TaskId::new);

    // C12: scan for orphaned tasks other than the one we were
    // specifically spawned to resume, and hand each off to its own
    // freshly spawned runner rather than silently absorbing it here.
    let report = orphan::recover_orphans(&store);
    for task_id in report.orphaned {
        if resume_first.as_ref() == Some(&task_id) {
            continue;
        }
        warn!(task_id = %task_id, "orphaned task found, respawning a runner to recover it");
        if let Err(e) = runner::spawn_detached(&data_root, Some(&task_id)) {
            error!(task_id = %task_id, error = %e, "failed to respawn runner for orphaned task");
        }
    }

    let cfg = runner::RunnerConfig {
        data_root,
        concurrency: args.concurrency.unwrap_or(3),
        persistent: args.persistent,
    };

    if let Err(e) = runner::drain_queue(store, executor, clock, resume_first, cfg).await {
        error!(error = %e, "runner exited with an error");
        std::process::exit(1);
    }

    info!("cahd exiting");
}
