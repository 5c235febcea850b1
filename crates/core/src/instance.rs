// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime execution state of a workflow: the single source of truth
//! for progress.

use crate::error::ErrorCategory;
use crate::workflow::{EdgeId, NodeId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

crate::define_id! {
    /// Identifier for a running (or completed) workflow instance.
    pub struct InstanceId;
}

/// Workflow-level execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

/// Per-node execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Ready,
    Running,
    Waiting,
    Done,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, NodeStatus::Done | NodeStatus::Skipped)
    }

    pub fn is_runnable(self) -> bool {
        matches!(self, NodeStatus::Pending | NodeStatus::Ready)
    }
}

/// State tracked per node within an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub status: NodeStatus,
    #[serde(default)]
    pub started_at_ms: Option<u64>,
    #[serde(default)]
    pub completed_at_ms: Option<u64>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_error_category: Option<ErrorCategory>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub variables_snapshot: Option<HashMap<String, JsonValue>>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            status: NodeStatus::Pending,
            started_at_ms: None,
            completed_at_ms: None,
            attempts: 0,
            last_error: None,
            last_error_category: None,
            duration_ms: None,
            variables_snapshot: None,
        }
    }
}

/// The mutable execution state of a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: InstanceId,
    pub workflow_id: WorkflowId,
    pub status: InstanceStatus,
    #[serde(default)]
    pub node_states: HashMap<NodeId, NodeState>,
    #[serde(default)]
    pub variables: HashMap<String, JsonValue>,
    #[serde(default)]
    pub outputs: HashMap<NodeId, JsonValue>,
    #[serde(default)]
    pub loop_counts: HashMap<EdgeId, u32>,
    #[serde(default)]
    pub active_loops: HashMap<NodeId, Vec<NodeId>>,
    #[serde(default)]
    pub started_at_ms: Option<u64>,
    #[serde(default)]
    pub completed_at_ms: Option<u64>,
    #[serde(default)]
    pub paused_at_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkflowInstance {
    pub fn new(id: InstanceId, workflow_id: WorkflowId, node_ids: impl IntoIterator<Item = NodeId>) -> Self {
        let node_states = node_ids
            .into_iter()
            .map(|id| (id, NodeState::default()))
            .collect();
        Self {
            id,
            workflow_id,
            status: InstanceStatus::Pending,
            node_states,
            variables: HashMap::new(),
            outputs: HashMap::new(),
            loop_counts: HashMap::new(),
            active_loops: HashMap::new(),
            started_at_ms: None,
            completed_at_ms: None,
            paused_at_ms: None,
            error: None,
        }
    }

    pub fn node_state(&self, id: &NodeId) -> Option<&NodeState> {
        self.node_states.get(id)
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
