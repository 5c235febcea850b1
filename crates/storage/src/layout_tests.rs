use super::*;
use serial_test::serial;

#[test]
fn explicit_override_wins_over_env() {
    let root = resolve_data_root(Some(Path::new("/explicit")));
    assert_eq!(root, PathBuf::from("/explicit"));
}

#[test]
#[serial(cah_data_dir_env)]
fn env_var_used_when_no_override() {
    std::env::set_var(DATA_DIR_ENV, "/from-env");
    let root = resolve_data_root(None);
    std::env::remove_var(DATA_DIR_ENV);
    assert_eq!(root, PathBuf::from("/from-env"));
}

#[test]
#[serial(cah_data_dir_env)]
fn defaults_when_neither_set() {
    std::env::remove_var(DATA_DIR_ENV);
    let root = resolve_data_root(None);
    assert_eq!(root, PathBuf::from(DEFAULT_DATA_DIR));
}

#[test]
fn task_paths_are_pure_functions_of_root_and_id() {
    let layout = PathLayout::new("/data");
    let id = TaskId::new("task-20260101-000000-abc");
    assert_eq!(
        layout.task_json(&id),
        PathBuf::from("/data/tasks/task-20260101-000000-abc/task.json")
    );
    assert_eq!(
        layout.result_md(&id),
        PathBuf::from("/data/tasks/task-20260101-000000-abc/outputs/result.md")
    );
    assert_eq!(layout.queue_json(), PathBuf::from("/data/queue.json"));
    assert_eq!(layout.runner_lock(), PathBuf::from("/data/runner.lock"));
}
