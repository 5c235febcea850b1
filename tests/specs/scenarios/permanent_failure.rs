//! S3: node A fails three times in a row (retried to `max_attempts`,
//! then given up on). The workflow and task both end up failed.

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
        id: WorkflowId::new("wf-permanent"),
        task_id: None,
        name: "permanent-failure".into(),
        description: "run step A, which never recovers".into(),
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
async fn node_fails_three_times_then_workflow_fails() {
    let script = vec![
        err(BackendError::Process(None, "boom 1".into())),
        err(BackendError::Process(None, "boom 2".into())),
        err(BackendError::Process(None, "boom 3".into())),
    ];
    let harness = Harness::new(fast_retry_workflow(), script);
    let task = harness.submit("run step A, which never recovers");

    harness.executor.clone().execute_task(task.clone(), ExecuteOptions::default()).await.expect("execute_task");

    let finished = harness.read_task(&task.id);
    assert_eq!(finished.status, TaskStatus::Failed);

    let instance = harness.read_instance(&task.id);
    assert_eq!(instance.status, cah_core::InstanceStatus::Failed);
    let state = instance.node_states.get(&NodeId::new("A")).expect("node A state");
    assert_eq!(state.status, cah_core::instance::NodeStatus::Failed);
    assert_eq!(state.attempts, 3);
    let error = instance.error.expect("workflow error should be set");
    assert!(error.contains('A'), "error should mention node A: {error}");

    let now = harness.clock.now_ms();
    assert!(harness.queue.dequeue(None, now).expect("dequeue").is_none(), "no job should remain for A after its third failure");
}
