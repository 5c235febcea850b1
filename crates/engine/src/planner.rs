// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Planner trait: turns a task description into a typed [`Workflow`]
//! by asking a [`BackendAdapter`] for one. The core never trusts the
//! backend's output blindly — a malformed or unparseable plan falls
//! back to a trivial single-task graph rather than failing the task
//! outright.

use async_trait::async_trait;
use cah_adapters::{BackendAdapter, BackendRequest, BackendResult};
use cah_core::workflow::{Edge, EdgeId, Node, NodeConfig, NodeId, OnError, RetryPolicy, Workflow, WorkflowId, WorkflowSettings};
use cah_core::Task;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EngineError;

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, task: &Task, backend: Arc<dyn BackendAdapter>) -> Result<Workflow, EngineError>;
}

const PLANNING_INSTRUCTIONS: &str = concat!(
    "You are planning the execution of a task as a directed workflow graph. ",
    "Respond with ONLY a JSON object matching this shape, no prose: ",
    "{\"id\":string,\"name\":string,\"description\":string,",
    "\"nodes\":[{\"id\":string,\"name\":string,\"type\":\"start\"|\"end\"|\"task\"|\"condition\"|...}],",
    "\"edges\":[{\"id\":string,\"from\":string,\"to\":string}]}. ",
    "The node list must start with exactly one \"start\" node and end with exactly one \"end\" node.",
);

/// Asks a backend for a plan in JSON; falls back to a single `task`
/// node wrapping the raw description when the response can't be
/// parsed into a valid [`Workflow`].
pub struct BackendPlanner;

impl BackendPlanner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BackendPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Planner for BackendPlanner {
    async fn plan(&self, task: &Task, backend: Arc<dyn BackendAdapter>) -> Result<Workflow, EngineError> {
        let prompt = format!("{PLANNING_INSTRUCTIONS}\n\nTask title: {}\nTask description:\n{}", task.title, task.description);
        let request = BackendRequest {
            prompt,
            model: task.model.clone(),
            cwd: task.cwd.clone(),
            timeout_ms: 120_000,
            on_delta: Box::new(|_chunk: &str| {}),
        };

        let result = backend.invoke(request).await;
        match result {
            Ok(BackendResult { response, .. }) => match parse_plan(&response, task) {
                Some(workflow) => Ok(workflow),
                None => {
                    tracing::warn!(task_id = %task.id, "planner response was not a valid workflow, falling back to a single task node");
                    Ok(fallback_workflow(task))
                }
            },
            Err(err) => {
                tracing::warn!(task_id = %task.id, error = %err, "planner backend invocation failed, falling back to a single task node");
                Ok(fallback_workflow(task))
            }
        }
    }
}

fn parse_plan(response: &str, task: &Task) -> Option<Workflow> {
    let json_slice = extract_json_object(response)?;
    let mut workflow: Workflow = serde_json::from_str(json_slice).ok()?;
    workflow.task_id = Some(task.id.as_str().to_string());
    workflow.validate().ok()?;
    Some(workflow)
}

/// Backends wrap JSON in prose or code fences more often than not;
/// take the outermost `{...}` span rather than requiring a clean
/// response.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// `start -> task -> end`, the task node carrying the description
/// verbatim as its prompt.
pub fn fallback_workflow(task: &Task) -> Workflow {
    let start_id = NodeId::new("start");
    let work_id = NodeId::new("execute");
    let end_id = NodeId::new("end");

    let node = |id: NodeId, name: &str, config: NodeConfig| Node {
        id,
        name: name.to_string(),
        config,
        timeout_ms: None,
        on_error: OnError::Fail,
        retry: RetryPolicy::default(),
    };

    Workflow {
        id: WorkflowId::new(format!("wf-{}", task.id)),
        task_id: Some(task.id.as_str().to_string()),
        name: task.title.clone(),
        description: task.description.clone(),
        nodes: vec![
            node(start_id.clone(), "start", NodeConfig::Start),
            node(
                work_id.clone(),
                "execute",
                NodeConfig::Task {
                    prompt: task.description.clone(),
                    persona: None,
                },
            ),
            node(end_id.clone(), "end", NodeConfig::End),
        ],
        edges: vec![
            Edge {
                id: EdgeId::new("start-to-execute"),
                from: start_id,
                to: work_id.clone(),
                condition: None,
                max_loops: None,
                label: None,
            },
            Edge {
                id: EdgeId::new("execute-to-end"),
                from: work_id,
                to: end_id,
                condition: None,
                max_loops: None,
                label: None,
            },
        ],
        variables: HashMap::new(),
        inputs: HashMap::new(),
        outputs: HashMap::new(),
        settings: WorkflowSettings::default(),
    }
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod tests;
