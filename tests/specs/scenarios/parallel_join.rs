//! S4: `start -> {A,B} -> join -> end`. The join must not run until
//! both A and B are done, and it runs exactly once.

use cah_core::workflow::NodeId;
use cah_core::{InstanceStatus, TaskStatus};

use crate::prelude::*;

#[tokio::test]
async fn join_waits_for_both_branches_and_runs_once() {
    let harness = Harness::new(parallel_join_workflow(), vec![ok_after(std::time::Duration::from_millis(60), "A-out"), ok("B-out")]);
    let task = harness.submit("run A and B then join");

    harness.executor.clone().execute_task(task.clone(), ExecuteOptions::default()).await.expect("execute_task");

    let finished = harness.read_task(&task.id);
    assert_eq!(finished.status, TaskStatus::Completed);

    let instance = harness.read_instance(&task.id);
    assert_eq!(instance.status, InstanceStatus::Completed);

    let a = instance.node_states.get(&NodeId::new("A")).expect("A state");
    let b = instance.node_states.get(&NodeId::new("B")).expect("B state");
    let join = instance.node_states.get(&NodeId::new("join")).expect("join state");
    assert_eq!(a.status, cah_core::instance::NodeStatus::Done);
    assert_eq!(b.status, cah_core::instance::NodeStatus::Done);
    assert_eq!(join.status, cah_core::instance::NodeStatus::Done);
    assert_eq!(join.attempts, 1, "join must fire exactly once, after both branches finish");

    // Join cannot have started before the slower branch (A) finished.
    let a_completed = a.completed_at_ms.expect("A completed_at");
    let join_started = join.started_at_ms.expect("join started_at");
    assert!(join_started >= a_completed, "join started ({join_started}) before A completed ({a_completed})");
}
