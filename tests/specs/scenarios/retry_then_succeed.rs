//! S2: node A fails transiently on attempt 1, succeeds on attempt 2.

use cah_adapters::BackendError;
use cah_core::workflow::{Edge, EdgeId, Node, NodeConfig, NodeId, OnError, RetryPolicy, Workflow, WorkflowSettings};
use cah_core::{TaskStatus, WorkflowId};

use crate::prelude::*;

fn fast_retry_workflow() -> Workflow {
    let retry = RetryPolicy { max_attempts: 3, backoff_ms: 5, backoff_multiplier: 1.0 };
    let start = Node { id: NodeId::new("start"), name: "start".into(), config: NodeConfig::Start, timeout_ms: None, on_error: OnError::Fail, retry: RetryPolicy::default() };
    let a = Node { id: NodeId::new("A"), name: "step A".into(), config: NodeConfig::Task { prompt: "do A".into(), persona: None }, timeout_ms: None, on_error: OnError::Fail, retry };
    let end = Node { id: NodeId::new("end"), name: "end".into(), config: NodeConfig::End, timeout_ms: None, on_error: OnError::Fail, retry: RetryPolicy::default() };
    Workflow {
        id: WorkflowId::new("wf-retry"),
        task_id: None,
        name: "retry".into(),
        description: "retry then succeed".into(),
        nodes: vec![start, a, end],
        edges: vec![
            Edge { id: EdgeId::new("e1"), from: NodeId::new("start"), to: NodeId::new("A"), condition: None, max_loops: None, label: None },
            Edge { id: EdgeId::new("e2"), from: NodeId::new("A"), to: NodeId::new("end"), condition: None, max_loops: None, label: None },
        ],
        variables: Default::default(),
        inputs: Default::default(),
        outputs: Default::default(),
        settings: WorkflowSettings::default(),
    }
}

#[tokio::test]
async fn node_retries_once_then_completes() {
    let harness = Harness::new(fast_retry_workflow(), vec![err(BackendError::Process(None, "transient blip".into())), ok("A-out")]);
    let task = harness.submit("run step A with a transient hiccup");

    harness.executor.clone().execute_task(task.clone(), ExecuteOptions::default()).await.expect("execute_task");

    let finished = harness.read_task(&task.id);
    assert_eq!(finished.status, TaskStatus::Completed);

    let instance = harness.read_instance(&task.id);
    let state = instance.node_states.get(&NodeId::new("A")).expect("node A state");
    assert_eq!(state.attempts, 2, "node A should have recorded two attempts");
    assert_eq!(state.status, cah_core::instance::NodeStatus::Done);
}
