// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C9: one handler function per node type, dispatched by
//! [`dispatch`]. Every handler except `task` (which needs an async
//! backend round trip and is driven directly by the executor) is a
//! pure function over an [`EvalContext`] snapshot: no I/O, no locking.

mod assign;
mod condition;
mod delay;
mod foreach;
mod join;
mod loop_node;
mod schedule;
mod script;
mod switch;

use crate::eval::EvalContext;
use cah_core::error::ErrorCategory;
use cah_core::workflow::{EdgeId, Node, NodeConfig, NodeId};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// What a handler decided should happen to the node it was given.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerStatus {
    Done,
    Failed { error: String, category: ErrorCategory },
    WaitingHuman,
    /// Not finished yet: re-enqueue the same node after `delay_ms`
    /// without treating this as a retry attempt (used by `delay`,
    /// `schedule`, and the polling phase of `loop`/`foreach`).
    Retry { delay_ms: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct HandlerOutcome {
    pub status: Option<HandlerStatus>,
    pub variable_updates: HashMap<String, JsonValue>,
    pub output: Option<JsonValue>,
    /// Downstream nodes to mark `skipped` immediately (the branches a
    /// `switch` didn't take).
    pub skip_nodes: Vec<NodeId>,
}

impl HandlerOutcome {
    fn done() -> Self {
        Self {
            status: Some(HandlerStatus::Done),
            ..Default::default()
        }
    }

    fn failed(error: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            status: Some(HandlerStatus::Failed { error: error.into(), category }),
            ..Default::default()
        }
    }

    fn retry(delay_ms: u64) -> Self {
        Self {
            status: Some(HandlerStatus::Retry { delay_ms }),
            ..Default::default()
        }
    }
}

/// Read-only inputs every synchronous handler needs.
pub struct HandlerContext<'a> {
    pub eval: EvalContext,
    pub now_ms: u64,
    pub loop_counts: &'a HashMap<EdgeId, u32>,
}

/// Dispatch every node type except `start`, `end`, `parallel`, `human`,
/// and `task`, which the caller (worker/executor) handles inline —
/// `start`/`end`/`parallel` because they are trivial, `human` because
/// it needs queue access, `task` because it needs an async backend.
pub fn dispatch(node: &Node, ctx: &HandlerContext) -> HandlerOutcome {
    match &node.config {
        NodeConfig::Start | NodeConfig::End | NodeConfig::Parallel => HandlerOutcome::done(),
        NodeConfig::Task { .. } => HandlerOutcome::failed("task nodes must be dispatched through the async executor path", ErrorCategory::Permanent),
        NodeConfig::Human { .. } => HandlerOutcome {
            status: Some(HandlerStatus::WaitingHuman),
            ..Default::default()
        },
        NodeConfig::Condition { expression } => condition::handle(expression, ctx),
        NodeConfig::Join => join::handle(),
        NodeConfig::Delay { value, unit } => delay::handle(&node.id, *value, *unit, ctx),
        NodeConfig::Schedule { cron, datetime, timezone } => schedule::handle(&node.id, cron.as_deref(), datetime.as_deref(), timezone.as_deref(), ctx),
        NodeConfig::Loop { kind, loop_var, max_iterations, .. } => loop_node::handle(&node.id, kind, loop_var, *max_iterations, ctx),
        NodeConfig::Switch { expression, cases } => switch::handle(expression, cases, ctx),
        NodeConfig::Assign { assignments } => assign::handle(assignments, ctx),
        NodeConfig::Script { expression, output_var, assignments } => script::handle(expression.as_deref(), output_var.as_deref(), assignments, ctx),
        NodeConfig::Foreach {
            collection,
            item_var,
            index_var,
            body_nodes,
            mode,
            max_parallel,
        } => foreach::handle(&node.id, collection, item_var, index_var.as_deref(), body_nodes, *mode, *max_parallel, ctx),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
