// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared wiring for CLI commands: data root resolution, the store,
//! and (only for commands that actually run a workflow step inline —
//! `submit --foreground` and `inject-node`) a full [`TaskExecutor`].

use std::sync::Arc;

use anyhow::Result;
use cah_adapters::{BackendRegistry, SubprocessBackendAdapter};
use cah_core::clock::{Clock, SystemClock};
use cah_engine::{BackendPlanner, TaskEventBus, TaskExecutor};
use cah_queue::WorkflowQueue;
use cah_storage::{resolve_data_root, PathLayout, TaskStore};

pub fn layout() -> PathLayout {
    PathLayout::new(resolve_data_root(None))
}

pub fn store(layout: &PathLayout) -> Result<Arc<TaskStore>> {
    std::fs::create_dir_all(layout.tasks_dir())?;
    Ok(Arc::new(TaskStore::new(layout.clone())))
}

pub fn queue(layout: &PathLayout) -> Arc<WorkflowQueue> {
    Arc::new(WorkflowQueue::new(layout.clone()))
}

/// The single backend this build of `cah` drives: an external
/// `claude` process by default, overridable via `CAH_BACKEND_PROGRAM`
/// for development against a stub.
pub fn backend_registry() -> BackendRegistry {
    let program = std::env::var("CAH_BACKEND_PROGRAM").unwrap_or_else(|_| "claude".to_string());
    let args: Vec<String> = std::env::var("CAH_BACKEND_ARGS")
        .map(|raw| raw.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    let adapter = Arc::new(SubprocessBackendAdapter::new("claude", program, args));
    BackendRegistry::new().register(adapter).with_default("claude")
}

pub fn executor(store: Arc<TaskStore>, queue: Arc<WorkflowQueue>) -> Arc<TaskExecutor> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let bus = TaskEventBus::new(1024);
    Arc::new(TaskExecutor::new(store, queue, backend_registry(), Arc::new(BackendPlanner::new()), bus, clock))
}
