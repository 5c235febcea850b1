// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workflow graph: nodes, edges, and the per-node-type config union.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

crate::define_id! {
    /// Identifier for a synthesized workflow plan.
    pub struct WorkflowId;
}

crate::define_id! {
    /// Identifier for a node within a workflow.
    pub struct NodeId;
}

crate::define_id! {
    /// Identifier for a directed edge within a workflow.
    pub struct EdgeId;
}

/// Retry policy attached to a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "RetryPolicy::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "RetryPolicy::default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "RetryPolicy::default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    fn default_max_attempts() -> u32 {
        3
    }
    fn default_backoff_ms() -> u64 {
        1000
    }
    fn default_backoff_multiplier() -> f64 {
        2.0
    }

    /// Delay before attempt number `attempt` (1-indexed), in milliseconds.
    pub fn backoff_for_attempt(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1) as i32;
        (self.backoff_ms as f64 * self.backoff_multiplier.powi(exp)) as u64
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            backoff_ms: Self::default_backoff_ms(),
            backoff_multiplier: Self::default_backoff_multiplier(),
        }
    }
}

/// What a node does when its handler reports a permanent failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    Fail,
    Skip,
    Continue,
}

impl Default for OnError {
    fn default() -> Self {
        OnError::Fail
    }
}

/// Unit used by `delay` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Seconds,
    Minutes,
    Hours,
}

impl DelayUnit {
    pub fn to_ms(self, value: u64) -> u64 {
        match self {
            DelayUnit::Seconds => value * 1000,
            DelayUnit::Minutes => value * 60_000,
            DelayUnit::Hours => value * 3_600_000,
        }
    }
}

/// Iteration strategy for `loop` nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopKind {
    While { condition: String },
    For { init: String, end: String, step: String },
    Until { condition: String },
}

/// Concurrency strategy for `foreach` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeachMode {
    Sequential,
    Parallel,
}

/// One case of a `switch` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` means this is the `default` case.
    #[serde(default)]
    pub value: Option<String>,
    pub target_node: NodeId,
}

/// One assignment performed by an `assign` or `script` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub variable: String,
    pub value: JsonValue,
    #[serde(default)]
    pub is_expression: bool,
}

/// Per-node-type configuration. A closed tagged union matching the
/// node types enumerated in the data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    Start,
    End,
    Task {
        prompt: String,
        #[serde(default)]
        persona: Option<String>,
    },
    Condition {
        expression: String,
    },
    Parallel,
    Join,
    Human {
        #[serde(default)]
        prompt: Option<String>,
    },
    Delay {
        value: u64,
        unit: DelayUnit,
    },
    Schedule {
        #[serde(default)]
        cron: Option<String>,
        #[serde(default)]
        datetime: Option<String>,
        #[serde(default)]
        timezone: Option<String>,
    },
    Loop {
        #[serde(flatten)]
        kind: LoopKind,
        loop_var: String,
        body_nodes: Vec<NodeId>,
        max_iterations: u32,
    },
    Switch {
        expression: String,
        cases: Vec<SwitchCase>,
    },
    Assign {
        assignments: Vec<Assignment>,
    },
    Script {
        #[serde(default)]
        expression: Option<String>,
        #[serde(default)]
        output_var: Option<String>,
        #[serde(default)]
        assignments: Vec<ScriptAssignment>,
    },
    Foreach {
        collection: String,
        item_var: String,
        #[serde(default)]
        index_var: Option<String>,
        body_nodes: Vec<NodeId>,
        mode: ForeachMode,
        #[serde(default)]
        max_parallel: Option<u32>,
    },
}

/// `script` node assignment driven by an expression rather than a literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptAssignment {
    pub variable: String,
    pub expression: String,
}

impl NodeConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeConfig::Start => "start",
            NodeConfig::End => "end",
            NodeConfig::Task { .. } => "task",
            NodeConfig::Condition { .. } => "condition",
            NodeConfig::Parallel => "parallel",
            NodeConfig::Join => "join",
            NodeConfig::Human { .. } => "human",
            NodeConfig::Delay { .. } => "delay",
            NodeConfig::Schedule { .. } => "schedule",
            NodeConfig::Loop { .. } => "loop",
            NodeConfig::Switch { .. } => "switch",
            NodeConfig::Assign { .. } => "assign",
            NodeConfig::Script { .. } => "script",
            NodeConfig::Foreach { .. } => "foreach",
        }
    }
}

/// A typed vertex in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    #[serde(flatten)]
    pub config: NodeConfig,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub on_error: OnError,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Node {
    /// Default node timeout (30 minutes) when none is configured.
    pub const DEFAULT_TIMEOUT_MS: u64 = 30 * 60 * 1000;

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(Self::DEFAULT_TIMEOUT_MS)
    }

    pub fn is_start(&self) -> bool {
        matches!(self.config, NodeConfig::Start)
    }

    pub fn is_end(&self) -> bool {
        matches!(self.config, NodeConfig::End)
    }
}

/// A directed edge, optionally conditional or loop-bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub max_loops: Option<u32>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Timeout settings for the workflow as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSettings {
    #[serde(default)]
    pub workflow_timeout_ms: Option<u64>,
}

/// The synthesized plan: an immutable-ish graph of typed nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    #[serde(default)]
    pub task_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub variables: HashMap<String, JsonValue>,
    #[serde(default)]
    pub inputs: HashMap<String, JsonValue>,
    #[serde(default)]
    pub outputs: HashMap<String, JsonValue>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

impl Workflow {
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn edges_from(&self, id: &NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| &e.from == id)
    }

    pub fn edges_to(&self, id: &NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| &e.to == id)
    }

    pub fn start_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_start())
    }

    pub fn end_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_end())
    }

    /// Validate the ordered invariants from the data model:
    /// exactly one `start` (first) and one `end` (last), unique node
    /// ids, every edge endpoint known, no edge originates from `end`,
    /// and loop/foreach/switch configs reference only known node ids.
    pub fn validate(&self) -> Result<(), CoreError> {
        let starts: Vec<_> = self.nodes.iter().filter(|n| n.is_start()).collect();
        let ends: Vec<_> = self.nodes.iter().filter(|n| n.is_end()).collect();
        if starts.len() != 1 {
            return Err(CoreError::GraphInvariantViolation(format!(
                "workflow must have exactly one start node, found {}",
                starts.len()
            )));
        }
        if ends.len() != 1 {
            return Err(CoreError::GraphInvariantViolation(format!(
                "workflow must have exactly one end node, found {}",
                ends.len()
            )));
        }
        if !self.nodes.first().map(|n| n.is_start()).unwrap_or(false) {
            return Err(CoreError::GraphInvariantViolation(
                "start node must be first in the node list".into(),
            ));
        }
        if !self.nodes.last().map(|n| n.is_end()).unwrap_or(false) {
            return Err(CoreError::GraphInvariantViolation(
                "end node must be last in the node list".into(),
            ));
        }

        let mut seen = HashSet::new();
        for n in &self.nodes {
            if !seen.insert(n.id.clone()) {
                return Err(CoreError::GraphInvariantViolation(format!(
                    "duplicate node id: {}",
                    n.id
                )));
            }
        }
        let known: HashSet<&NodeId> = self.nodes.iter().map(|n| &n.id).collect();

        for e in &self.edges {
            if !known.contains(&e.from) {
                return Err(CoreError::GraphInvariantViolation(format!(
                    "edge {} references unknown from-node {}",
                    e.id, e.from
                )));
            }
            if !known.contains(&e.to) {
                return Err(CoreError::GraphInvariantViolation(format!(
                    "edge {} references unknown to-node {}",
                    e.id, e.to
                )));
            }
            if let Some(end) = self.end_node() {
                if e.from == end.id {
                    return Err(CoreError::GraphInvariantViolation(
                        "no edge may originate from the end node".into(),
                    ));
                }
            }
        }

        for n in &self.nodes {
            match &n.config {
                NodeConfig::Loop { body_nodes, .. } | NodeConfig::Foreach { body_nodes, .. } => {
                    for b in body_nodes {
                        if !known.contains(b) {
                            return Err(CoreError::GraphInvariantViolation(format!(
                                "node {} references unknown body node {}",
                                n.id, b
                            )));
                        }
                    }
                }
                NodeConfig::Switch { cases, .. } => {
                    for c in cases {
                        if !known.contains(&c.target_node) {
                            return Err(CoreError::GraphInvariantViolation(format!(
                                "node {} switch case references unknown target {}",
                                n.id, c.target_node
                            )));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
