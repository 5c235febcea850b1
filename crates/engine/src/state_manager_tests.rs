use super::*;
use cah_core::workflow::{Edge, EdgeId, Node, NodeConfig, OnError, RetryPolicy, WorkflowId, WorkflowSettings};
use cah_core::instance::InstanceId;
use cah_queue::WorkflowQueue;
use cah_storage::PathLayout;
use tempfile::TempDir;

fn queue() -> (TempDir, WorkflowQueue) {
    let dir = TempDir::new().unwrap();
    let layout = PathLayout::new(dir.path());
    (dir, WorkflowQueue::new(layout))
}

fn node(id: &str, config: NodeConfig) -> Node {
    Node {
        id: NodeId::new(id),
        name: id.to_string(),
        config,
        timeout_ms: None,
        on_error: OnError::Fail,
        retry: RetryPolicy::default(),
    }
}

fn edge(id: &str, from: &str, to: &str, condition: Option<&str>) -> Edge {
    Edge {
        id: EdgeId::new(id),
        from: NodeId::new(from),
        to: NodeId::new(to),
        condition: condition.map(|s| s.to_string()),
        max_loops: None,
        label: None,
    }
}

fn linear_workflow() -> Workflow {
    Workflow {
        id: WorkflowId::new("w1"),
        task_id: None,
        name: "w".into(),
        description: String::new(),
        nodes: vec![
            node("start", NodeConfig::Start),
            node("a", NodeConfig::Task { prompt: "do a".into(), persona: None }),
            node("end", NodeConfig::End),
        ],
        edges: vec![edge("e1", "start", "a", None), edge("e2", "a", "end", None)],
        variables: Default::default(),
        inputs: Default::default(),
        outputs: Default::default(),
        settings: WorkflowSettings::default(),
    }
}

fn instance_for(workflow: &Workflow) -> WorkflowInstance {
    WorkflowInstance::new(InstanceId::new("i1"), workflow.id.clone(), workflow.nodes.iter().map(|n| n.id.clone()))
}

#[test]
fn start_node_is_immediately_runnable() {
    let wf = linear_workflow();
    let inst = instance_for(&wf);
    let ctx = crate::eval::EvalContext::default();
    assert!(can_execute_node(&wf, &inst, &NodeId::new("start"), &ctx));
    assert!(!can_execute_node(&wf, &inst, &NodeId::new("a"), &ctx));
}

#[test]
fn downstream_node_becomes_runnable_after_predecessor_completes() {
    let wf = linear_workflow();
    let mut inst = instance_for(&wf);
    mark_node_done(&mut inst, &NodeId::new("start"), None, 1000);
    let ctx = crate::eval::EvalContext::default();
    assert!(can_execute_node(&wf, &inst, &NodeId::new("a"), &ctx));
}

#[test]
fn conditional_edge_gates_downstream_node() {
    let mut wf = linear_workflow();
    wf.edges[0].condition = Some("flag == true".to_string());
    let mut inst = instance_for(&wf);
    mark_node_done(&mut inst, &NodeId::new("start"), None, 1000);
    inst.variables.insert("flag".to_string(), serde_json::json!(false));
    let mut ctx = crate::eval::EvalContext::default();
    ctx.variables = inst.variables.clone();
    assert!(!can_execute_node(&wf, &inst, &NodeId::new("a"), &ctx));
    ctx.variables.insert("flag".to_string(), serde_json::json!(true));
    assert!(can_execute_node(&wf, &inst, &NodeId::new("a"), &ctx));
}

#[test]
fn progress_counts_completed_and_skipped_nodes() {
    let wf = linear_workflow();
    let mut inst = instance_for(&wf);
    mark_node_done(&mut inst, &NodeId::new("start"), None, 1000);
    mark_node_skipped(&mut inst, &NodeId::new("a"), 1000);
    let (completed, total) = workflow_progress(&inst);
    assert_eq!((completed, total), (2, 3));
}

#[test]
fn completion_reached_once_end_node_done() {
    let wf = linear_workflow();
    let mut inst = instance_for(&wf);
    mark_node_done(&mut inst, &NodeId::new("start"), None, 1000);
    mark_node_done(&mut inst, &NodeId::new("a"), None, 1000);
    assert_eq!(check_completion(&wf, &inst), None);
    mark_node_done(&mut inst, &NodeId::new("end"), None, 1000);
    assert_eq!(check_completion(&wf, &inst), Some(InstanceStatus::Completed));
}

#[test]
fn failed_node_with_nothing_runnable_marks_instance_failed() {
    let wf = linear_workflow();
    let mut inst = instance_for(&wf);
    mark_node_done(&mut inst, &NodeId::new("start"), None, 1000);
    mark_node_failed(&mut inst, &NodeId::new("a"), "boom".into(), ErrorCategory::Permanent, 1000);
    assert_eq!(check_completion(&wf, &inst), Some(InstanceStatus::Failed));
}

#[test]
fn retrying_a_node_resets_it_to_pending() {
    let wf = linear_workflow();
    let mut inst = instance_for(&wf);
    mark_node_running(&mut inst, &NodeId::new("a"), 1000);
    mark_node_failed(&mut inst, &NodeId::new("a"), "boom".into(), ErrorCategory::Transient, 1000);
    reset_node_for_retry(&mut inst, &NodeId::new("a"));
    assert_eq!(inst.node_states[&NodeId::new("a")].status, NodeStatus::Pending);
}

#[test]
fn advance_enqueues_every_newly_ready_node() {
    let wf = linear_workflow();
    let mut inst = instance_for(&wf);
    mark_node_done(&mut inst, &NodeId::new("start"), None, 1000);
    let jobs = advance(&wf, &mut inst, &[NodeId::new("start")]);
    assert_eq!(inst.node_states[&NodeId::new("a")].status, NodeStatus::Ready);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].node_id, NodeId::new("a"));
}

#[test]
fn advance_does_not_touch_the_queue_until_the_caller_enqueues_it() {
    let (_d, q) = queue();
    let wf = linear_workflow();
    let mut inst = instance_for(&wf);
    mark_node_done(&mut inst, &NodeId::new("start"), None, 1000);
    let jobs = advance(&wf, &mut inst, &[NodeId::new("start")]);
    assert!(q.all_jobs().unwrap().is_empty());
    enqueue_ready(&q, jobs, 1000);
    let queued = q.all_jobs().unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].data.node_id, NodeId::new("a"));
}

#[test]
fn advance_cascades_past_a_skipped_node() {
    let wf = linear_workflow();
    let mut inst = instance_for(&wf);
    mark_node_done(&mut inst, &NodeId::new("start"), None, 1000);
    mark_node_skipped(&mut inst, &NodeId::new("a"), 1000);
    advance(&wf, &mut inst, &[NodeId::new("start"), NodeId::new("a")]);
    assert_eq!(inst.node_states[&NodeId::new("end")].status, NodeStatus::Ready);
}

fn loop_workflow() -> Workflow {
    Workflow {
        id: WorkflowId::new("w2"),
        task_id: None,
        name: "loopy".into(),
        description: String::new(),
        nodes: vec![
            node("start", NodeConfig::Start),
            node(
                "ctrl",
                NodeConfig::Loop {
                    kind: cah_core::workflow::LoopKind::While { condition: "true".into() },
                    loop_var: "i".into(),
                    body_nodes: vec![NodeId::new("body")],
                    max_iterations: 3,
                },
            ),
            node("body", NodeConfig::Task { prompt: "step".into(), persona: None }),
            node("end", NodeConfig::End),
        ],
        edges: vec![
            edge("e1", "start", "ctrl", None),
            edge("e2", "ctrl", "body", Some("outputs.ctrl == true")),
            edge("e3", "ctrl", "end", Some("outputs.ctrl == false")),
            {
                let mut back = edge("e4", "body", "ctrl", None);
                back.max_loops = Some(3);
                back
            },
        ],
        variables: Default::default(),
        inputs: Default::default(),
        outputs: Default::default(),
        settings: WorkflowSettings::default(),
    }
}

#[test]
fn loop_back_edge_is_exhausted_after_max_loops() {
    let wf = loop_workflow();
    let mut inst = instance_for(&wf);
    let back_edge = wf.edges.iter().find(|e| e.id == EdgeId::new("e4")).unwrap();
    assert!(take_loop_edge(&mut inst, back_edge));
    assert!(take_loop_edge(&mut inst, back_edge));
    assert!(take_loop_edge(&mut inst, back_edge));
    assert!(!take_loop_edge(&mut inst, back_edge));
}

#[test]
fn resetting_for_next_iteration_puts_controller_and_body_back_to_pending() {
    let wf = loop_workflow();
    let mut inst = instance_for(&wf);
    mark_node_done(&mut inst, &NodeId::new("ctrl"), Some(serde_json::json!(true)), 1000);
    mark_node_done(&mut inst, &NodeId::new("body"), None, 1000);
    reset_for_next_iteration(&mut inst, &[NodeId::new("ctrl"), NodeId::new("body")]);
    assert_eq!(inst.node_states[&NodeId::new("ctrl")].status, NodeStatus::Pending);
    assert_eq!(inst.node_states[&NodeId::new("body")].status, NodeStatus::Pending);
}
