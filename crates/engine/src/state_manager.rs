// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure functions over [`WorkflowInstance`]/[`NodeState`] (C6). No I/O,
//! no locking — callers hold the instance lock and persist the result.

use cah_core::error::ErrorCategory;
use cah_core::instance::{InstanceStatus, NodeState, NodeStatus, WorkflowInstance};
use cah_core::workflow::{Edge, Node, NodeId, Workflow};
use cah_queue::{EnqueueOptions, WorkflowQueue};
use std::collections::{HashMap, HashSet};

/// Nodes currently executing (queued or actively running a handler).
pub fn active_nodes(instance: &WorkflowInstance) -> Vec<&NodeId> {
    instance
        .node_states
        .iter()
        .filter(|(_, s)| matches!(s.status, NodeStatus::Running | NodeStatus::Ready))
        .map(|(id, _)| id)
        .collect()
}

pub fn pending_nodes(instance: &WorkflowInstance) -> Vec<&NodeId> {
    instance
        .node_states
        .iter()
        .filter(|(_, s)| s.status == NodeStatus::Pending)
        .map(|(id, _)| id)
        .collect()
}

pub fn completed_nodes(instance: &WorkflowInstance) -> Vec<&NodeId> {
    instance
        .node_states
        .iter()
        .filter(|(_, s)| s.status.is_completed())
        .map(|(id, _)| id)
        .collect()
}

pub fn failed_nodes(instance: &WorkflowInstance) -> Vec<&NodeId> {
    instance
        .node_states
        .iter()
        .filter(|(_, s)| s.status == NodeStatus::Failed)
        .map(|(id, _)| id)
        .collect()
}

/// `(completed_count, total_count)` for progress reporting.
pub fn workflow_progress(instance: &WorkflowInstance) -> (usize, usize) {
    let total = instance.node_states.len();
    let completed = instance.node_states.values().filter(|s| s.status.is_completed()).count();
    (completed, total)
}

/// A node is runnable once *every* edge feeding it has a completed (or
/// skipped) predecessor whose condition (if any) passes — AND
/// semantics over all incoming edges, not just one. This is what makes
/// `join` correct without special-casing it: a join's every branch
/// must settle, and a non-taken conditional branch only stops blocking
/// once something has explicitly marked it `skipped`.
pub fn can_execute_node(workflow: &Workflow, instance: &WorkflowInstance, node_id: &NodeId, ctx: &crate::eval::EvalContext) -> bool {
    let Some(state) = instance.node_states.get(node_id) else {
        return false;
    };
    if !state.status.is_runnable() {
        return false;
    }
    let incoming: Vec<_> = workflow.edges_to(node_id).collect();
    if incoming.is_empty() {
        return true;
    }
    incoming.iter().all(|edge| {
        let Some(from_state) = instance.node_states.get(&edge.from) else {
            return false;
        };
        if !from_state.status.is_completed() {
            return false;
        }
        match &edge.condition {
            Some(expr) => crate::eval::evaluate_bool(expr, ctx),
            None => true,
        }
    })
}

/// All nodes in `workflow` that are currently executable, in graph
/// order.
pub fn ready_nodes<'a>(workflow: &'a Workflow, instance: &WorkflowInstance, ctx: &crate::eval::EvalContext) -> Vec<&'a Node> {
    workflow
        .nodes
        .iter()
        .filter(|n| can_execute_node(workflow, instance, &n.id, ctx))
        .collect()
}

/// `join` nodes require every upstream branch to have reached a
/// terminal state (done, skipped, or failed-with-skip/continue) before
/// they can fire, regardless of which single edge satisfied
/// [`can_execute_node`].
pub fn join_inputs_settled(workflow: &Workflow, instance: &WorkflowInstance, node_id: &NodeId) -> bool {
    workflow.edges_to(node_id).all(|edge| {
        instance
            .node_states
            .get(&edge.from)
            .map(|s| s.status.is_completed() || s.status == NodeStatus::Failed)
            .unwrap_or(false)
    })
}

pub fn mark_node_running(instance: &mut WorkflowInstance, node_id: &NodeId, now_ms: u64) {
    if let Some(s) = instance.node_states.get_mut(node_id) {
        s.status = NodeStatus::Running;
        s.started_at_ms.get_or_insert(now_ms);
        s.attempts += 1;
    }
}

pub fn mark_node_done(instance: &mut WorkflowInstance, node_id: &NodeId, output: Option<serde_json::Value>, now_ms: u64) {
    if let Some(output) = output {
        instance.outputs.insert(node_id.clone(), output);
    }
    if let Some(s) = instance.node_states.get_mut(node_id) {
        s.status = NodeStatus::Done;
        s.completed_at_ms = Some(now_ms);
        s.duration_ms = s.started_at_ms.map(|start| now_ms.saturating_sub(start));
        s.last_error = None;
    }
}

pub fn mark_node_failed(instance: &mut WorkflowInstance, node_id: &NodeId, error: String, category: ErrorCategory, now_ms: u64) {
    if let Some(s) = instance.node_states.get_mut(node_id) {
        s.status = NodeStatus::Failed;
        s.completed_at_ms = Some(now_ms);
        s.duration_ms = s.started_at_ms.map(|start| now_ms.saturating_sub(start));
        s.last_error = Some(error);
        s.last_error_category = Some(category);
    }
}

pub fn mark_node_skipped(instance: &mut WorkflowInstance, node_id: &NodeId, now_ms: u64) {
    if let Some(s) = instance.node_states.get_mut(node_id) {
        s.status = NodeStatus::Skipped;
        s.completed_at_ms = Some(now_ms);
    }
}

pub fn mark_node_waiting(instance: &mut WorkflowInstance, node_id: &NodeId) {
    if let Some(s) = instance.node_states.get_mut(node_id) {
        s.status = NodeStatus::Waiting;
    }
}

pub fn reset_node_for_retry(instance: &mut WorkflowInstance, node_id: &NodeId) {
    if let Some(s) = instance.node_states.get_mut(node_id) {
        s.status = NodeStatus::Pending;
    }
}

/// Snapshot the current variable set onto a node's state, used by
/// `loop`/`foreach` bodies so each iteration can be inspected after the
/// fact.
pub fn snapshot_variables(instance: &mut WorkflowInstance, node_id: &NodeId, variables: HashMap<String, serde_json::Value>) {
    if let Some(s) = instance.node_states.get_mut(node_id) {
        s.variables_snapshot = Some(variables);
    }
}

/// Whether the workflow as a whole has reached a terminal state: `Some`
/// once the `end` node is done, a node failed with `on_error: fail`
/// (surfaced by the caller passing `force_failed`), or every node is
/// otherwise settled with nothing left runnable.
pub fn check_completion(workflow: &Workflow, instance: &WorkflowInstance) -> Option<InstanceStatus> {
    if let Some(end) = workflow.end_node() {
        if instance.node_states.get(&end.id).map(|s| s.status == NodeStatus::Done).unwrap_or(false) {
            return Some(InstanceStatus::Completed);
        }
    }
    let any_runnable = instance.node_states.values().any(|s| s.status.is_runnable() || s.status == NodeStatus::Running);
    if !any_runnable {
        let any_failed = instance.node_states.values().any(|s| s.status == NodeStatus::Failed);
        return Some(if any_failed { InstanceStatus::Failed } else { InstanceStatus::Completed });
    }
    None
}

pub fn node_state<'a>(instance: &'a WorkflowInstance, node_id: &NodeId) -> Option<&'a NodeState> {
    instance.node_states.get(node_id)
}

fn outputs_by_name(instance: &WorkflowInstance) -> HashMap<String, serde_json::Value> {
    instance.outputs.iter().map(|(k, v)| (k.as_str().to_string(), v.clone())).collect()
}

/// Apply a handler's `variable_updates` onto `instance.variables`. A
/// `null` value deletes the key rather than storing it, so a handler
/// can retract a scratch variable (e.g. `__delay_until::{id}` once a
/// delay has elapsed).
pub fn apply_variable_updates(instance: &mut WorkflowInstance, updates: &HashMap<String, serde_json::Value>) {
    for (key, value) in updates {
        if value.is_null() {
            instance.variables.remove(key);
        } else {
            instance.variables.insert(key.clone(), value.clone());
        }
    }
}

/// Re-evaluate readiness downstream of `from_nodes` and return the
/// [`cah_core::JobData`] for every node that just became executable
/// (C7), marking each one `Ready` in `instance` as it's collected.
/// Cascades: marking a node `skipped` can itself unblock further
/// nodes, so newly-skipped targets feed back into the worklist.
///
/// Does **not** touch `queue.json` itself — per `spec.md` §4.7/§4.9,
/// the downstream enqueue must happen only after the node's completed
/// state (and output) has been durably written to `instance.json`.
/// Callers run this inside [`cah_storage::TaskStore::with_instance`]
/// and enqueue the returned jobs only once that closure returns, i.e.
/// only after `instance.json` has been persisted — never before it.
#[must_use]
pub fn advance(workflow: &Workflow, instance: &mut WorkflowInstance, from_nodes: &[NodeId]) -> Vec<cah_core::JobData> {
    let mut worklist: Vec<NodeId> = from_nodes.to_vec();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut to_enqueue = Vec::new();

    while let Some(from) = worklist.pop() {
        if !visited.insert(from.clone()) {
            continue;
        }
        let ctx = crate::eval::EvalContext {
            variables: instance.variables.clone(),
            outputs: outputs_by_name(instance),
        };
        let targets: Vec<Edge> = workflow.edges_from(&from).cloned().collect();
        for edge in targets {
            if let Some(expr) = &edge.condition {
                if !crate::eval::evaluate_bool(expr, &ctx) {
                    continue;
                }
            }
            if edge.max_loops.is_some() && !take_loop_edge(instance, &edge) {
                continue;
            }
            if !can_execute_node(workflow, instance, &edge.to, &ctx) {
                continue;
            }
            if let Some(state) = instance.node_states.get_mut(&edge.to) {
                state.status = NodeStatus::Ready;
            }
            to_enqueue.push(cah_core::JobData {
                workflow_id: workflow.id.clone(),
                instance_id: instance.id.clone(),
                node_id: edge.to.clone(),
            });
        }
    }
    to_enqueue
}

/// Enqueue every job `advance` returned, after the caller's
/// `with_instance` closure has already persisted `instance.json`.
pub fn enqueue_ready(queue: &WorkflowQueue, jobs: Vec<cah_core::JobData>, now_ms: u64) {
    for data in jobs {
        let node_id = data.node_id.clone();
        if let Err(err) = queue.enqueue(data, 1, now_ms, EnqueueOptions::default()) {
            tracing::warn!(node = %node_id, error = %err, "failed to enqueue downstream node");
        }
    }
}

/// Attempt to traverse a loop-back edge (one with `max_loops` set):
/// bumps the per-edge counter and returns whether it was still under
/// budget. Edges without `max_loops` are not loop-backs and always
/// succeed.
pub fn take_loop_edge(instance: &mut WorkflowInstance, edge: &Edge) -> bool {
    let Some(max) = edge.max_loops else { return true };
    let counter = instance.loop_counts.entry(edge.id.clone()).or_insert(0);
    if *counter >= max {
        return false;
    }
    *counter += 1;
    true
}

/// Put a loop controller and its body nodes back to `Pending` so the
/// next iteration can run, without losing accumulated attempt counts
/// or prior variable snapshots.
pub fn reset_for_next_iteration(instance: &mut WorkflowInstance, node_ids: &[NodeId]) {
    for id in node_ids {
        if let Some(s) = instance.node_states.get_mut(id) {
            s.status = NodeStatus::Pending;
            s.completed_at_ms = None;
            s.last_error = None;
            s.last_error_category = None;
        }
    }
}

#[cfg(test)]
#[path = "state_manager_tests.rs"]
mod tests;
