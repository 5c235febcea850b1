use super::*;
use cah_core::task::{TaskPriority, TaskSource};
use cah_core::{InstanceId, InstanceStatus, WorkflowId, WorkflowInstance};
use cah_storage::PathLayout;
use serial_test::serial;
use tempfile::TempDir;

fn developing_task(id: &str) -> cah_core::Task {
    cah_core::Task {
        id: TaskId::new(id),
        title: "do the thing".into(),
        description: "".into(),
        priority: TaskPriority::Medium,
        status: TaskStatus::Developing,
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

/// Sets `CAH_DATA_DIR` to a fresh temp dir for the duration of the
/// closure, restoring the previous value (if any) afterward. Tests
/// that touch this env var must run `#[serial]` — `context::layout()`
/// reads it globally, so two tests racing here would clobber each
/// other's data root.
fn with_temp_data_dir<T>(f: impl FnOnce(&TempDir) -> T) -> T {
    let dir = TempDir::new().unwrap();
    let prior = std::env::var("CAH_DATA_DIR").ok();
    std::env::set_var("CAH_DATA_DIR", dir.path());
    let out = f(&dir);
    match prior {
        Some(v) => std::env::set_var("CAH_DATA_DIR", v),
        None => std::env::remove_var("CAH_DATA_DIR"),
    }
    out
}

#[test]
#[serial]
fn pause_syncs_instance_status_and_timestamp_alongside_task_status() {
    with_temp_data_dir(|dir| {
        let layout = PathLayout::new(dir.path());
        let store = cah_storage::TaskStore::new(layout);
        std::fs::create_dir_all(store.layout().tasks_dir()).unwrap();

        let task = developing_task("task-20260101-000000-abc");
        store.write_task(&task).unwrap();
        let instance = WorkflowInstance::new(InstanceId::new(task.id.as_str()), WorkflowId::new("wf"), []);
        store.write_instance(&task.id, &instance).unwrap();

        pause(ReasonArgs { id: task.id.to_string(), reason: Some("waiting on input".into()) }, OutputFormat::Text).unwrap();

        let reloaded_task = store.read_task(&task.id).unwrap();
        assert_eq!(reloaded_task.status, TaskStatus::Paused);
        assert_eq!(reloaded_task.pause_reason.as_deref(), Some("waiting on input"));

        let reloaded_instance = store.read_instance(&task.id).unwrap();
        assert_eq!(reloaded_instance.status, InstanceStatus::Paused);
        assert!(reloaded_instance.paused_at_ms.is_some());
    })
}

#[test]
#[serial]
fn stop_syncs_instance_status_to_cancelled() {
    with_temp_data_dir(|dir| {
        let layout = PathLayout::new(dir.path());
        let store = cah_storage::TaskStore::new(layout);
        std::fs::create_dir_all(store.layout().tasks_dir()).unwrap();

        let task = developing_task("task-20260101-000001-def");
        store.write_task(&task).unwrap();
        let instance = WorkflowInstance::new(InstanceId::new(task.id.as_str()), WorkflowId::new("wf"), []);
        store.write_instance(&task.id, &instance).unwrap();

        stop(IdArgs { id: task.id.to_string() }, OutputFormat::Text).unwrap();

        let reloaded_instance = store.read_instance(&task.id).unwrap();
        assert_eq!(reloaded_instance.status, InstanceStatus::Cancelled);
    })
}
