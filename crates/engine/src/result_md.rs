// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Renders `outputs/result.md` (§6): one human-readable summary of a
//! finished (or in-flight) task, with stable headings so a script can
//! grep it reliably. Status emoji are fixed, not themeable.

use crate::stats::{self, Stats};
use cah_core::instance::{NodeStatus, WorkflowInstance};
use cah_core::task::Task;
use cah_core::workflow::{NodeConfig, Workflow};
use std::fmt::Write as _;

fn status_emoji(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Done => "\u{2705}",
        NodeStatus::Failed => "\u{274c}",
        NodeStatus::Running => "\u{1f535}",
        NodeStatus::Pending | NodeStatus::Ready => "\u{23f3}",
        NodeStatus::Skipped => "\u{23ed}\u{fe0f}",
        NodeStatus::Waiting => "\u{1f440}",
    }
}

fn fmt_duration(ms: Option<u64>) -> String {
    let Some(ms) = ms else { return "-".to_string() };
    let secs = ms / 1000;
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

fn node_output_text(instance: &WorkflowInstance, node_id: &cah_core::workflow::NodeId) -> Option<String> {
    let output = instance.outputs.get(node_id)?;
    Some(
        output
            .get("response")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| output.to_string()),
    )
}

/// Render the full `result.md` body for `task`, reading node-level
/// detail from `workflow`/`instance`. Safe to call at any point in the
/// run, not just on completion — `stats` and per-node status reflect
/// whatever has happened so far.
pub fn render(task: &Task, workflow: &Workflow, instance: &WorkflowInstance) -> String {
    let stats: Stats = stats::compute(workflow, instance);
    let mut out = String::new();

    let _ = writeln!(out, "# {}\n", task.title);
    out.push_str("## Summary\n\n");
    let _ = writeln!(out, "- **Status**: {:?}", task.status);
    let _ = writeln!(out, "- **Progress**: {}/{} nodes", stats.done + stats.skipped, stats.total_nodes);
    let _ = writeln!(out, "- **Duration**: {}", fmt_duration(stats.duration_ms));
    let _ = writeln!(out, "- **Cost**: ${:.4}\n", stats.cost_usd);

    out.push_str("## Description\n\n");
    let _ = writeln!(out, "{}\n", task.description);

    out.push_str("## Node Execution\n\n");
    for node in &workflow.nodes {
        if !matches!(node.config, NodeConfig::Task { .. }) {
            continue;
        }
        let state = instance.node_states.get(&node.id);
        let status = state.map(|s| s.status).unwrap_or(NodeStatus::Pending);
        let _ = writeln!(out, "### {} {}\n", status_emoji(status), node.name);
        if let Some(state) = state {
            let _ = writeln!(out, "- **Status**: {:?}", state.status);
            let _ = writeln!(out, "- **Attempts**: {}", state.attempts);
            if let Some(text) = node_output_text(instance, &node.id) {
                let _ = writeln!(out, "- **Output**: {text}");
            }
            if let Some(err) = &state.last_error {
                let _ = writeln!(out, "- **Error**: {err}");
            }
        }
        out.push('\n');
    }

    if let Some(error) = &instance.error {
        out.push_str("## Workflow Error\n\n");
        let _ = writeln!(out, "{error}");
    }

    out
}

#[cfg(test)]
#[path = "result_md_tests.rs"]
mod tests;
