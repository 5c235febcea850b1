use super::*;
use cah_core::task::{TaskPriority, TaskSource};
use cah_storage::PathLayout;
use serial_test::serial;
use tempfile::TempDir;

fn task(id: &str, status: TaskStatus, cwd: &str) -> cah_core::Task {
    cah_core::Task {
        id: TaskId::new(id),
        title: "do the thing".into(),
        description: "".into(),
        priority: TaskPriority::Medium,
        status,
        cwd: PathBuf::from(cwd),
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

#[test]
fn next_eligible_task_skips_pending_tasks_whose_cwd_is_already_running() {
    let dir = TempDir::new().unwrap();
    let store = TaskStore::new(PathLayout::new(dir.path()));
    store.write_task(&task("task-running", TaskStatus::Developing, "/repo-a")).unwrap();
    store.write_task(&task("task-blocked", TaskStatus::Pending, "/repo-a")).unwrap();
    store.write_task(&task("task-free", TaskStatus::Pending, "/repo-b")).unwrap();

    let picked = next_eligible_task(&store).expect("one eligible task");
    assert_eq!(picked.id, TaskId::new("task-free"));
}

#[test]
fn next_eligible_task_is_none_when_every_pending_cwd_is_taken() {
    let dir = TempDir::new().unwrap();
    let store = TaskStore::new(PathLayout::new(dir.path()));
    store.write_task(&task("task-running", TaskStatus::Developing, "/repo-a")).unwrap();
    store.write_task(&task("task-blocked", TaskStatus::Pending, "/repo-a")).unwrap();

    assert!(next_eligible_task(&store).is_none());
}

#[test]
#[serial]
fn find_cahd_binary_honors_explicit_override() {
    std::env::set_var("CAH_DAEMON_BINARY", "/opt/cah/cahd");
    let found = find_cahd_binary();
    std::env::remove_var("CAH_DAEMON_BINARY");
    assert_eq!(found, PathBuf::from("/opt/cah/cahd"));
}
