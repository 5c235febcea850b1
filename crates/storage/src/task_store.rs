// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task folder CRUD (C4): task metadata, workflow definition,
//! instance state, process info, messages, and append-only logs.
//!
//! No global index is maintained — enumerating tasks is a directory
//! scan of `tasks/*/task.json`; any index built on top is a cache, not
//! a second source of truth.

use crate::atomic_store::{self, StoreError};
use crate::layout::PathLayout;
use cah_core::id::random_suffix;
use cah_core::{ProcessInfo, Task, TaskId, TaskMessage, TimelineEntry, Workflow, WorkflowInstance};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskLookupError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("ambiguous task prefix '{prefix}' matches: {matches:?}")]
    Ambiguous { prefix: String, matches: Vec<String> },
}

/// Per-task folder CRUD layered over [`PathLayout`] and [`atomic_store`].
pub struct TaskStore {
    layout: PathLayout,
}

impl TaskStore {
    pub fn new(layout: PathLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    /// Generate a fresh task id of the form
    /// `task-YYYYMMDD-HHMMSS-<3 random base36 chars>`, widening to 5
    /// random characters on the (astronomically rare) collision with
    /// an existing task folder.
    pub fn generate_task_id(&self, timestamp: &str) -> TaskId {
        let candidate = TaskId::new(format!("task-{timestamp}-{}", random_suffix(3)));
        if !self.layout.task_dir(&candidate).exists() {
            return candidate;
        }
        TaskId::new(format!("task-{timestamp}-{}", random_suffix(5)))
    }

    // -- task.json -------------------------------------------------

    pub fn write_task(&self, task: &Task) -> Result<(), StoreError> {
        atomic_store::write_json(&self.layout.task_json(&task.id), task)
    }

    pub fn read_task(&self, id: &TaskId) -> Option<Task> {
        atomic_store::read_json(&self.layout.task_json(id), None)
    }

    /// Scan `tasks/*/task.json`. This is the only enumeration
    /// mechanism — there is no secondary index to fall out of sync.
    pub fn list_task_ids(&self) -> Vec<TaskId> {
        let tasks_dir = self.layout.tasks_dir();
        let Ok(entries) = fs::read_dir(&tasks_dir) else {
            return Vec::new();
        };
        let mut ids: Vec<TaskId> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| self.layout.task_json(&TaskId::new(name.clone())).exists())
            .map(TaskId::new)
            .collect();
        ids.sort();
        ids
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.list_task_ids()
            .into_iter()
            .filter_map(|id| self.read_task(&id))
            .collect()
    }

    /// Resolve a user-typed prefix (6-8 chars by convention) to a
    /// unique task id.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<TaskId, TaskLookupError> {
        let ids = self.list_task_ids();
        if let Some(exact) = ids.iter().find(|id| id.as_str() == prefix) {
            return Ok(exact.clone());
        }
        let matches: Vec<&TaskId> = ids.iter().filter(|id| id.as_str().starts_with(prefix)).collect();
        match matches.len() {
            0 => Err(TaskLookupError::NotFound(prefix.to_string())),
            1 => Ok(matches[0].clone()),
            _ => Err(TaskLookupError::Ambiguous {
                prefix: prefix.to_string(),
                matches: matches.into_iter().map(|id| id.as_str().to_string()).collect(),
            }),
        }
    }

    // -- workflow.json -----------------------------------------------

    pub fn write_workflow(&self, task_id: &TaskId, workflow: &Workflow) -> Result<(), StoreError> {
        atomic_store::write_json(&self.layout.workflow_json(task_id), workflow)
    }

    pub fn read_workflow(&self, task_id: &TaskId) -> Option<Workflow> {
        atomic_store::read_json(&self.layout.workflow_json(task_id), None)
    }

    // -- instance.json (source of truth for progress) -----------------

    pub fn write_instance(&self, task_id: &TaskId, instance: &WorkflowInstance) -> Result<(), StoreError> {
        atomic_store::write_json(&self.layout.instance_json(task_id), instance)
    }

    pub fn read_instance(&self, task_id: &TaskId) -> Option<WorkflowInstance> {
        atomic_store::read_json(&self.layout.instance_json(task_id), None)
    }

    /// Read-modify-write `instance.json` under `instance.json.lock`, so
    /// two node workers completing sibling `parallel` branches at once
    /// never clobber each other's state update.
    pub fn with_instance<T>(&self, task_id: &TaskId, f: impl FnOnce(&mut WorkflowInstance) -> T) -> Result<Option<T>, crate::file_lock::LockError> {
        let lock_path = self.layout.instance_lock(task_id);
        crate::file_lock::FileLock::with_lock(&lock_path, || {
            let mut instance = self.read_instance(task_id)?;
            let out = f(&mut instance);
            if let Err(e) = self.write_instance(task_id, &instance) {
                tracing::warn!(task_id = %task_id, error = %e, "failed to persist workflow instance");
            }
            Some(out)
        })
    }

    // -- process.json --------------------------------------------------

    pub fn write_process_info(&self, task_id: &TaskId, info: &ProcessInfo) -> Result<(), StoreError> {
        atomic_store::write_json(&self.layout.process_json(task_id), info)
    }

    pub fn read_process_info(&self, task_id: &TaskId) -> Option<ProcessInfo> {
        atomic_store::read_json(&self.layout.process_json(task_id), None)
    }

    // -- messages.json --------------------------------------------------

    pub fn read_messages(&self, task_id: &TaskId) -> Vec<TaskMessage> {
        atomic_store::read_json(&self.layout.messages_json(task_id), Some(Vec::new())).unwrap_or_default()
    }

    /// Append-under-lock: reuses the per-task instance lock (messages
    /// are per-task, same as the instance) so a `cah msg` writer never
    /// races the executor's own drain.
    pub fn append_message(&self, task_id: &TaskId, message: TaskMessage) -> Result<(), StoreError> {
        let lock_path = self.layout.instance_lock(task_id);
        crate::file_lock::FileLock::with_lock(&lock_path, || {
            let mut messages = self.read_messages(task_id);
            messages.push(message);
            atomic_store::write_json(&self.layout.messages_json(task_id), &messages)
        })
        .map_err(|e| StoreError::Io {
            path: self.layout.messages_json(task_id).display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::WouldBlock, e.to_string()),
        })?
    }

    /// Drain unconsumed messages, marking them consumed in the same
    /// locked read-modify-write so a concurrent appender or drainer
    /// never double-drains or loses a write.
    pub fn drain_unconsumed_messages(&self, task_id: &TaskId) -> Result<Vec<TaskMessage>, StoreError> {
        let lock_path = self.layout.instance_lock(task_id);
        crate::file_lock::FileLock::with_lock(&lock_path, || {
            let mut messages = self.read_messages(task_id);
            let drained: Vec<TaskMessage> = messages.iter().filter(|m| !m.consumed).cloned().collect();
            if drained.is_empty() {
                return Ok(drained);
            }
            for m in messages.iter_mut() {
                m.consumed = true;
            }
            atomic_store::write_json(&self.layout.messages_json(task_id), &messages)?;
            Ok(drained)
        })
        .map_err(|e| StoreError::Io {
            path: self.layout.messages_json(task_id).display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::WouldBlock, e.to_string()),
        })?
    }

    // -- logs -------------------------------------------------------------

    pub fn append_execution_log(&self, task_id: &TaskId, line: &str) -> Result<(), StoreError> {
        atomic_store::append_to_file(&self.layout.execution_log(task_id), line)
    }

    pub fn append_event_jsonl(&self, task_id: &TaskId, json_line: &str) -> Result<(), StoreError> {
        atomic_store::append_to_file(&self.layout.events_jsonl(task_id), json_line)
    }

    // -- timeline.json ------------------------------------------------

    pub fn read_timeline(&self, task_id: &TaskId) -> Vec<TimelineEntry> {
        atomic_store::read_json(&self.layout.timeline_json(task_id), Some(Vec::new())).unwrap_or_default()
    }

    pub fn append_timeline(&self, task_id: &TaskId, entry: TimelineEntry) -> Result<(), StoreError> {
        let mut timeline = self.read_timeline(task_id);
        timeline.push(entry);
        atomic_store::write_json(&self.layout.timeline_json(task_id), &timeline)
    }

    // -- generic derived-data slots (stats.json, outputs/result.md callers) --

    pub fn write_derived<T: Serialize>(&self, path: &std::path::Path, value: &T) -> Result<(), StoreError> {
        atomic_store::write_json(path, value)
    }

    pub fn read_derived<T: DeserializeOwned>(&self, path: &std::path::Path) -> Option<T> {
        atomic_store::read_json(path, None)
    }

    pub fn write_result_md(&self, task_id: &TaskId, markdown: &str) -> Result<(), StoreError> {
        atomic_store::ensure_dir(&self.layout.outputs_dir(task_id))?;
        std::fs::write(self.layout.result_md(task_id), markdown).map_err(|e| StoreError::Io {
            path: self.layout.result_md(task_id).display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
#[path = "task_store_tests.rs"]
mod tests;
