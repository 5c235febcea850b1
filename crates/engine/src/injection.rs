// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dynamic node injection (§4.8): splice a new `task` node into a
//! workflow that is already running, anchored after whatever node is
//! currently executing or, failing that, whatever node finished most
//! recently. The graph keeps executing normally around the insertion —
//! no special-casing in the readiness logic is needed because the
//! injected node is just another node with ordinary edges.

use cah_core::id::random_suffix;
use cah_core::instance::{NodeState, NodeStatus, WorkflowInstance};
use cah_core::workflow::{Edge, EdgeId, Node, NodeConfig, NodeId, OnError, RetryPolicy, Workflow};
use cah_core::JobData;

use crate::error::EngineError;
use crate::state_manager;

/// The node a freshly injected node should be spliced after: the
/// currently-running node if there is one, otherwise whichever
/// non-`end` node completed most recently.
pub fn find_anchor(workflow: &Workflow, instance: &WorkflowInstance) -> Option<NodeId> {
    if let Some((id, _)) = instance.node_states.iter().find(|(_, s)| s.status == NodeStatus::Running) {
        return Some(id.clone());
    }
    workflow
        .nodes
        .iter()
        .filter(|n| !n.is_end())
        .filter_map(|n| instance.node_states.get(&n.id).and_then(|s| s.completed_at_ms).map(|t| (t, n.id.clone())))
        .max_by_key(|(completed_at, _)| *completed_at)
        .map(|(_, id)| id)
}

/// Splice a new `task` node in after `anchor`: every edge that used to
/// leave `anchor` now leaves the injected node instead (preserving its
/// condition), and a fresh unconditional `anchor -> injected` edge is
/// added. The new node starts `pending` in the instance.
fn splice(workflow: &mut Workflow, instance: &mut WorkflowInstance, anchor: &NodeId, prompt: String, persona: Option<String>) -> Result<NodeId, EngineError> {
    if workflow.node(anchor).is_none() {
        return Err(EngineError::Core(cah_core::error::CoreError::NotFound(format!("node {anchor}"))));
    }

    let new_id = NodeId::new(format!("injected-{}", random_suffix(6)));
    let new_edge_id = EdgeId::new(format!("edge-{}", random_suffix(6)));

    let node = Node {
        id: new_id.clone(),
        name: format!("injected: {}", prompt.chars().take(48).collect::<String>()),
        config: NodeConfig::Task { prompt, persona },
        timeout_ms: None,
        on_error: OnError::Fail,
        retry: RetryPolicy::default(),
    };

    for edge in workflow.edges.iter_mut().filter(|e| &e.from == anchor) {
        edge.from = new_id.clone();
    }
    workflow.edges.push(Edge {
        id: new_edge_id,
        from: anchor.clone(),
        to: new_id.clone(),
        condition: None,
        max_loops: None,
        label: None,
    });

    // `end` must remain last (the graph invariant `Workflow::validate`
    // enforces): insert just before it rather than pushing.
    let end_index = workflow.nodes.iter().position(|n| n.is_end()).unwrap_or(workflow.nodes.len());
    workflow.nodes.insert(end_index, node);

    instance.node_states.insert(new_id.clone(), NodeState::default());

    workflow.validate().map_err(EngineError::from)?;
    Ok(new_id)
}

/// Full injection: locate the anchor, splice the node into `workflow`,
/// and immediately re-evaluate readiness so the new node is enqueued
/// without waiting for an unrelated completion to trigger it.
///
/// Must be called with the instance lock held (the caller is expected
/// to be inside [`cah_storage::TaskStore::with_instance`]); the caller
/// still owns persisting `workflow` afterward, and must not enqueue
/// the returned jobs until that closure has persisted `instance.json`
/// (see [`state_manager::advance`]).
pub fn inject_task_node(
    workflow: &mut Workflow,
    instance: &mut WorkflowInstance,
    prompt: String,
    persona: Option<String>,
) -> Result<(NodeId, Vec<JobData>), EngineError> {
    let anchor = find_anchor(workflow, instance).ok_or_else(|| EngineError::Core(cah_core::error::CoreError::NotFound("no anchor node to inject after".into())))?;
    let new_id = splice(workflow, instance, &anchor, prompt, persona)?;
    let jobs = state_manager::advance(workflow, instance, &[anchor]);
    Ok((new_id, jobs))
}

#[cfg(test)]
#[path = "injection_tests.rs"]
mod tests;
