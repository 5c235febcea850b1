// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single source of truth for on-disk paths (C1). Every other path in
//! the workspace is a pure function of `(data_root, task_id, ...)` —
//! no component may construct these paths ad-hoc.

use cah_core::TaskId;
use std::path::{Path, PathBuf};

const DATA_DIR_ENV: &str = "CAH_DATA_DIR";
const DEFAULT_DATA_DIR: &str = ".cah-data";

/// Resolves the data root from, in order: an explicit override, the
/// `CAH_DATA_DIR` environment variable, then `./.cah-data`.
pub fn resolve_data_root(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    PathBuf::from(DEFAULT_DATA_DIR)
}

/// Deterministic layout of the data root: task folders and root-level
/// shared files (queue, locks, meta).
#[derive(Debug, Clone)]
pub struct PathLayout {
    root: PathBuf,
}

impl PathLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn task_dir(&self, task_id: &TaskId) -> PathBuf {
        self.tasks_dir().join(task_id.as_str())
    }

    pub fn task_json(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("task.json")
    }

    pub fn workflow_json(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("workflow.json")
    }

    pub fn instance_json(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("instance.json")
    }

    pub fn instance_lock(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("instance.json.lock")
    }

    pub fn process_json(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("process.json")
    }

    pub fn messages_json(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("messages.json")
    }

    pub fn stats_json(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("stats.json")
    }

    pub fn timeline_json(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("timeline.json")
    }

    pub fn logs_dir(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("logs")
    }

    pub fn execution_log(&self, task_id: &TaskId) -> PathBuf {
        self.logs_dir(task_id).join("execution.log")
    }

    pub fn events_jsonl(&self, task_id: &TaskId) -> PathBuf {
        self.logs_dir(task_id).join("events.jsonl")
    }

    pub fn outputs_dir(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir(task_id).join("outputs")
    }

    pub fn result_md(&self, task_id: &TaskId) -> PathBuf {
        self.outputs_dir(task_id).join("result.md")
    }

    pub fn queue_json(&self) -> PathBuf {
        self.root.join("queue.json")
    }

    pub fn queue_lock(&self) -> PathBuf {
        self.root.join("queue.json.lock")
    }

    pub fn runner_lock(&self) -> PathBuf {
        self.root.join("runner.lock")
    }

    pub fn meta_json(&self) -> PathBuf {
        self.root.join("meta.json")
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
