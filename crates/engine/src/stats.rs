// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Derived `stats.json`: node counts by status plus aggregate duration
//! and cost, computed fresh from `instance.json` on every write rather
//! than maintained incrementally — cheap at this system's scale and
//! immune to drift.

use cah_core::instance::{NodeStatus, WorkflowInstance};
use cah_core::workflow::{NodeConfig, Workflow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total_nodes: usize,
    pub pending: usize,
    pub running: usize,
    pub waiting: usize,
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub api_duration_ms: u64,
}

pub fn compute(workflow: &Workflow, instance: &WorkflowInstance) -> Stats {
    let mut stats = Stats {
        total_nodes: instance.node_states.len(),
        ..Default::default()
    };
    for state in instance.node_states.values() {
        match state.status {
            NodeStatus::Pending | NodeStatus::Ready => stats.pending += 1,
            NodeStatus::Running => stats.running += 1,
            NodeStatus::Waiting => stats.waiting += 1,
            NodeStatus::Done => stats.done += 1,
            NodeStatus::Failed => stats.failed += 1,
            NodeStatus::Skipped => stats.skipped += 1,
        }
    }
    stats.duration_ms = match (instance.started_at_ms, instance.completed_at_ms) {
        (Some(start), Some(end)) => Some(end.saturating_sub(start)),
        _ => None,
    };

    for node in &workflow.nodes {
        if !matches!(node.config, NodeConfig::Task { .. }) {
            continue;
        }
        let Some(output) = instance.outputs.get(&node.id) else { continue };
        if let Some(cost) = output.get("cost_usd").and_then(|v| v.as_f64()) {
            stats.cost_usd += cost;
        }
        if let Some(ms) = output.get("duration_api_ms").and_then(|v| v.as_u64()) {
            stats.api_duration_ms += ms;
        }
    }

    stats
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
