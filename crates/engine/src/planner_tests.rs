use super::*;
use cah_adapters::FakeBackendAdapter;
use cah_core::{TaskPriority, TaskSource, TaskStatus};
use std::path::PathBuf;

fn task() -> Task {
    Task {
        id: cah_core::TaskId::new("task-1"),
        title: "refactor the parser".into(),
        description: "split the tokenizer out of the parser module".into(),
        priority: TaskPriority::Medium,
        status: TaskStatus::Planning,
        cwd: PathBuf::from("/tmp"),
        assignee: None,
        backend: None,
        model: None,
        cron: None,
        source: TaskSource::User,
        created_at_ms: 0,
        updated_at_ms: 0,
        paused_at_ms: None,
        pause_reason: None,
    }
}

#[tokio::test]
async fn parses_a_well_formed_plan_from_the_backend() {
    let backend = Arc::new(FakeBackendAdapter::new("fake"));
    backend.push_response(
        r#"here is the plan:
        {"id":"wf-1","name":"refactor","description":"d","nodes":[
            {"id":"s","name":"start","type":"start"},
            {"id":"t","name":"do it","type":"task","prompt":"split it up"},
            {"id":"e","name":"end","type":"end"}
        ],"edges":[
            {"id":"e1","from":"s","to":"t"},
            {"id":"e2","from":"t","to":"e"}
        ]}
        thanks"#,
    );
    let planner = BackendPlanner::new();
    let workflow = planner.plan(&task(), backend).await.unwrap();
    assert_eq!(workflow.nodes.len(), 3);
    assert_eq!(workflow.task_id.as_deref(), Some("task-1"));
}

#[tokio::test]
async fn falls_back_to_a_single_task_node_on_garbage_response() {
    let backend = Arc::new(FakeBackendAdapter::new("fake"));
    backend.push_response("not json at all");
    let planner = BackendPlanner::new();
    let workflow = planner.plan(&task(), backend).await.unwrap();
    assert_eq!(workflow.nodes.len(), 3);
    assert!(matches!(workflow.nodes[1].config, NodeConfig::Task { .. }));
}

#[tokio::test]
async fn falls_back_when_backend_invocation_fails() {
    let backend = Arc::new(FakeBackendAdapter::new("fake"));
    backend.push_error(cah_adapters::BackendError::Config("no api key".into()));
    let planner = BackendPlanner::new();
    let workflow = planner.plan(&task(), backend).await.unwrap();
    assert_eq!(workflow.id.as_str(), "wf-task-1");
}
