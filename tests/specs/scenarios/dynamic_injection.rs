//! S6: inject a new task node after A while A is still running. The
//! new node must land between A and B in both the workflow graph and
//! execution order.

use std::time::Duration;

use cah_core::instance::NodeStatus;
use cah_core::workflow::NodeId;
use cah_core::TaskStatus;

use crate::prelude::*;

#[tokio::test]
async fn inject_node_runs_between_anchor_and_its_old_downstream() {
    let harness = Harness::new(linear_workflow(), vec![ok_after(Duration::from_millis(150), "A-out"), ok("injected-out"), ok("B-out")]);
    let task = harness.submit("run step A then step B");

    let run_handle = {
        let executor = harness.executor.clone();
        let task = task.clone();
        tokio::spawn(async move { executor.execute_task(task, ExecuteOptions::default()).await })
    };

    wait_until("node A running", || {
        harness.read_instance(&task.id).node_states.get(&NodeId::new("A")).map(|s| s.status == NodeStatus::Running).unwrap_or(false)
    })
    .await;

    let injected_id = harness.executor.inject_node(&task.id, "do the injected step".to_string(), None).expect("inject node");

    let workflow = harness.store.read_workflow(&task.id).expect("workflow");
    assert!(workflow.edges.iter().any(|e| e.from == NodeId::new("A") && e.to == injected_id), "A should now point at the injected node");
    assert!(workflow.edges.iter().any(|e| &e.from == &injected_id && e.to == NodeId::new("B")), "injected node should point at B");
    assert!(!workflow.edges.iter().any(|e| e.from == NodeId::new("A") && e.to == NodeId::new("B")), "the old direct A->B edge should be gone");

    let instance = harness.read_instance(&task.id);
    assert_eq!(instance.node_states.get(&injected_id).map(|s| s.status), Some(NodeStatus::Pending));

    run_handle.await.expect("join").expect("execute_task");

    let finished = harness.read_task(&task.id);
    assert_eq!(finished.status, TaskStatus::Completed);

    let instance = harness.read_instance(&task.id);
    let injected_state = instance.node_states.get(&injected_id).expect("injected node state");
    let b_state = instance.node_states.get(&NodeId::new("B")).expect("B state");
    assert_eq!(injected_state.status, NodeStatus::Done);
    assert_eq!(b_state.status, NodeStatus::Done);
    assert!(
        injected_state.completed_at_ms.expect("injected completed") <= b_state.started_at_ms.expect("B started"),
        "injected node must finish before B starts"
    );
}
