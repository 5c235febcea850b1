// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle event kinds published on the [`TaskEventBus`](crate) (the
//! bus itself lives in `cah-engine`; the event payload shape lives here
//! so both `cah-engine` and any out-of-tree consumer can share it).

use crate::instance::InstanceId;
use crate::task::TaskId;
use crate::workflow::{NodeId, WorkflowId};
use serde::{Deserialize, Serialize};

/// A lifecycle event fired by the task/workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    TaskCreated { task_id: TaskId },
    TaskStarted { task_id: TaskId },
    TaskPaused { task_id: TaskId, reason: Option<String> },
    TaskResumed { task_id: TaskId },
    TaskCompleted { task_id: TaskId },
    TaskFailed { task_id: TaskId, error: String },
    TaskCancelled { task_id: TaskId },
    WorkflowStarted {
        task_id: TaskId,
        workflow_id: WorkflowId,
        instance_id: InstanceId,
    },
    WorkflowCompleted {
        task_id: TaskId,
        instance_id: InstanceId,
        duration_ms: u64,
    },
    WorkflowFailed {
        task_id: TaskId,
        instance_id: InstanceId,
        error: String,
    },
    WorkflowProgress {
        task_id: TaskId,
        instance_id: InstanceId,
        completed: usize,
        total: usize,
    },
    NodeStarted { instance_id: InstanceId, node_id: NodeId },
    NodeCompleted { instance_id: InstanceId, node_id: NodeId },
    NodeFailed {
        instance_id: InstanceId,
        node_id: NodeId,
        error: String,
    },
    NodeWaiting { instance_id: InstanceId, node_id: NodeId },
}

impl Event {
    /// Stable name used for `timeline.json` rows and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Event::TaskCreated { .. } => "task:created",
            Event::TaskStarted { .. } => "task:started",
            Event::TaskPaused { .. } => "task:paused",
            Event::TaskResumed { .. } => "task:resumed",
            Event::TaskCompleted { .. } => "task:completed",
            Event::TaskFailed { .. } => "task:failed",
            Event::TaskCancelled { .. } => "task:cancelled",
            Event::WorkflowStarted { .. } => "workflow:started",
            Event::WorkflowCompleted { .. } => "workflow:completed",
            Event::WorkflowFailed { .. } => "workflow:failed",
            Event::WorkflowProgress { .. } => "workflow:progress",
            Event::NodeStarted { .. } => "node:started",
            Event::NodeCompleted { .. } => "node:completed",
            Event::NodeFailed { .. } => "node:failed",
            Event::NodeWaiting { .. } => "node:waiting",
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Event::TaskCreated { task_id }
            | Event::TaskStarted { task_id }
            | Event::TaskPaused { task_id, .. }
            | Event::TaskResumed { task_id }
            | Event::TaskCompleted { task_id }
            | Event::TaskFailed { task_id, .. }
            | Event::TaskCancelled { task_id }
            | Event::WorkflowStarted { task_id, .. }
            | Event::WorkflowCompleted { task_id, .. }
            | Event::WorkflowFailed { task_id, .. }
            | Event::WorkflowProgress { task_id, .. } => Some(task_id),
            Event::NodeStarted { .. }
            | Event::NodeCompleted { .. }
            | Event::NodeFailed { .. }
            | Event::NodeWaiting { .. } => None,
        }
    }
}

/// One row of `timeline.json`: every event the bus emits, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp_ms: u64,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_matches_external_interface_table() {
        assert_eq!(
            Event::WorkflowStarted {
                task_id: TaskId::new("t"),
                workflow_id: WorkflowId::new("w"),
                instance_id: InstanceId::new("i"),
            }
            .name(),
            "workflow:started"
        );
        assert_eq!(
            Event::NodeWaiting {
                instance_id: InstanceId::new("i"),
                node_id: NodeId::new("n")
            }
            .name(),
            "node:waiting"
        );
    }
}
