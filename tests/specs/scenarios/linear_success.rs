//! S1: `start -> A(task) -> B(task) -> end`, both backend calls succeed.

use cah_core::{InstanceStatus, TaskStatus};

use crate::prelude::*;

#[tokio::test]
async fn linear_workflow_completes_with_both_outputs() {
    let harness = Harness::new(linear_workflow(), vec![ok("A-out"), ok("B-out")]);
    let task = harness.submit("run step A then step B");

    harness.executor.clone().execute_task(task.clone(), ExecuteOptions::default()).await.expect("execute_task");

    let finished = harness.read_task(&task.id);
    assert_eq!(finished.status, TaskStatus::Completed);

    let instance = harness.read_instance(&task.id);
    assert_eq!(instance.status, InstanceStatus::Completed);
    let a_out = instance.outputs.get(&cah_core::workflow::NodeId::new("A")).expect("A output").get("response").and_then(|v| v.as_str()).unwrap();
    let b_out = instance.outputs.get(&cah_core::workflow::NodeId::new("B")).expect("B output").get("response").and_then(|v| v.as_str()).unwrap();
    assert_eq!(a_out, "A-out");
    assert_eq!(b_out, "B-out");

    let md = harness.result_md(&task.id);
    assert_eq!(md.matches('\u{2705}').count(), 2, "expected two done entries in result.md:\n{md}");

    let names = harness.timeline_event_names(&task.id);
    assert!(names.contains(&"workflow:started".to_string()), "{names:?}");
    assert!(names.contains(&"workflow:completed".to_string()), "{names:?}");
}
