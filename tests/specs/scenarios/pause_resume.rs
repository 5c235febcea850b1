//! S5: pause a workflow while node A is running, then resume it —
//! A's `running` state must be reset to `pending` and re-driven to
//! completion, and the whole workflow still finishes.

use std::time::Duration;

use cah_core::instance::NodeStatus;
use cah_core::workflow::NodeId;
use cah_core::{InstanceStatus, TaskStatus};

use crate::prelude::*;

#[tokio::test]
async fn pause_mid_execution_then_resume_completes() {
    let harness = Harness::new(
        three_node_workflow(),
        vec![ok_after(Duration::from_millis(200), "discarded"), ok("A-out"), ok("B-out"), ok("C-out")],
    );
    let task = harness.submit("run A then B then C");

    // Drive the task in the background and stop watching it the moment
    // A is observed running — standing in for a crash/external pause
    // mid-node, the case `prepare_resume` exists to recover from.
    let handle = {
        let executor = harness.executor.clone();
        let task = task.clone();
        tokio::spawn(async move { executor.execute_task(task, ExecuteOptions::default()).await })
    };

    wait_until("node A running", || {
        harness.read_instance(&task.id).node_states.get(&NodeId::new("A")).map(|s| s.status == NodeStatus::Running).unwrap_or(false)
    })
    .await;

    handle.abort();
    let _ = handle.await;

    let now = harness.clock.now_ms();
    harness
        .store
        .with_instance(&task.id, |inst| {
            inst.status = InstanceStatus::Paused;
            inst.paused_at_ms = Some(now);
        })
        .expect("pause instance")
        .expect("instance exists");
    let mut paused_task = harness.read_task(&task.id);
    paused_task.transition_to(TaskStatus::Paused, now).expect("task pause transition");
    harness.store.write_task(&paused_task).expect("write paused task");

    let reloaded = harness.read_task(&task.id);
    assert_eq!(reloaded.status, TaskStatus::Paused);
    assert!(reloaded.paused_at_ms.is_some());
    let instance = harness.read_instance(&task.id);
    assert_eq!(instance.status, InstanceStatus::Paused);
    assert_eq!(instance.node_states.get(&NodeId::new("A")).unwrap().status, NodeStatus::Running, "A should still be recorded running going into resume");

    harness
        .executor
        .clone()
        .execute_task(reloaded, ExecuteOptions { resume: true, ..ExecuteOptions::default() })
        .await
        .expect("resume execute_task");

    let finished = harness.read_task(&task.id);
    assert_eq!(finished.status, TaskStatus::Completed);
    let instance = harness.read_instance(&task.id);
    assert_eq!(instance.status, InstanceStatus::Completed);
    for id in ["A", "B", "C"] {
        assert_eq!(instance.node_states.get(&NodeId::new(id)).unwrap().status, NodeStatus::Done, "{id} should be done");
    }
}
