// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task: the user-facing unit of work.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Stable, lexicographically-sortable task identifier
    /// (`task-YYYYMMDD-HHMMSS-<suffix>`).
    pub struct TaskId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Planning,
    Developing,
    Reviewing,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether the runner should consider this task currently running
    /// (used by orphan recovery: a dead PID for one of these is an orphan).
    pub fn is_running(self) -> bool {
        matches!(
            self,
            TaskStatus::Planning | TaskStatus::Developing | TaskStatus::Reviewing
        )
    }

    /// Validate task status transitions per the lifecycle in the data model.
    pub fn validate_transition(self, to: TaskStatus) -> Result<(), CoreError> {
        use TaskStatus::*;
        let allowed = match (self, to) {
            (Pending, Planning) => true,
            (Pending, Developing) => true,
            (Pending, Cancelled) => true,
            (Planning, Developing) => true,
            (Planning, Failed) => true,
            (Developing, Reviewing) => true,
            (Developing, Paused) => true,
            (Developing, Completed) => true,
            (Developing, Failed) => true,
            (Developing, Cancelled) => true,
            (Reviewing, Completed) => true,
            (Reviewing, Failed) => true,
            (Reviewing, Developing) => true,
            (Paused, Developing) => true,
            (Paused, Cancelled) => true,
            (a, b) if a == b => true,
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(CoreError::InvalidStateTransition {
                entity: "task".into(),
                from: format!("{self:?}"),
                to: format!("{to:?}"),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    User,
    Selfdrive,
}

impl Default for TaskSource {
    fn default() -> Self {
        TaskSource::User
    }
}

/// The user-facing unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub cwd: PathBuf,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub source: TaskSource,
    pub created_at_ms: u64,
    #[serde(default)]
    pub updated_at_ms: u64,
    #[serde(default)]
    pub paused_at_ms: Option<u64>,
    #[serde(default)]
    pub pause_reason: Option<String>,
}

impl Task {
    pub fn transition_to(&mut self, to: TaskStatus, now_ms: u64) -> Result<(), CoreError> {
        self.status.validate_transition(to)?;
        self.status = to;
        self.updated_at_ms = now_ms;
        if to == TaskStatus::Paused {
            self.paused_at_ms = Some(now_ms);
        } else if to == TaskStatus::Developing {
            self.paused_at_ms = None;
            self.pause_reason = None;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
