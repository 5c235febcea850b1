//! Test helpers for the engine-level scenario specifications (§8).
//!
//! Each scenario stands up a real [`TaskExecutor`] against a
//! `tempfile`-backed data root, wired to a scripted backend adapter
//! instead of a real subprocess, and drives a task through it.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cah_adapters::{BackendAdapter, BackendError, BackendRegistry, BackendRequest, BackendResult};
use cah_core::clock::{Clock, SystemClock};
use cah_core::workflow::{Edge, EdgeId, Node, NodeConfig, NodeId, OnError, RetryPolicy, Workflow, WorkflowId, WorkflowSettings};
use cah_core::{Task, TaskId, TaskPriority, TaskSource, TaskStatus};
use cah_engine::planner::Planner;
use cah_engine::{EngineError, ExecuteOptions, TaskEventBus, TaskExecutor};
use cah_queue::WorkflowQueue;
use cah_storage::{PathLayout, TaskStore};
use parking_lot::Mutex;
use tempfile::TempDir;

// Spec polling timeouts for `wait_until`.
pub const SPEC_POLL_INTERVAL_MS: u64 = 20;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Poll `check` until it returns `true` or `SPEC_WAIT_MAX_MS` elapses.
/// Panics with `what` on timeout.
pub async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
    loop {
        if check() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS)).await;
    }
}

/// One scripted node-level response, optionally delayed to hold a node
/// `running` long enough for a test to observe or act on it (pause,
/// dynamic injection).
pub struct Scripted {
    pub delay: Option<Duration>,
    pub outcome: Result<String, BackendError>,
}

pub fn ok(response: impl Into<String>) -> Scripted {
    Scripted { delay: None, outcome: Ok(response.into()) }
}

pub fn ok_after(delay: Duration, response: impl Into<String>) -> Scripted {
    Scripted { delay: Some(delay), outcome: Ok(response.into()) }
}

pub fn err(error: BackendError) -> Scripted {
    Scripted { delay: None, outcome: Err(error) }
}

/// A `BackendAdapter` that consumes a fixed, ordered script of
/// responses, one per `invoke` call, waiting `delay` before replying
/// when one is set. Modeled on `cah_adapters::FakeBackendAdapter`, with
/// an added delay knob the fake doesn't need for unit tests but these
/// timing-sensitive scenarios do.
#[derive(Clone)]
pub struct ScriptedBackend {
    name: String,
    queue: Arc<Mutex<VecDeque<Scripted>>>,
}

impl ScriptedBackend {
    pub fn new(name: impl Into<String>, script: Vec<Scripted>) -> Self {
        Self {
            name: name.into(),
            queue: Arc::new(Mutex::new(script.into_iter().collect())),
        }
    }
}

#[async_trait]
impl BackendAdapter for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke<'a>(&self, request: BackendRequest<'a>) -> Result<BackendResult, BackendError> {
        let next = self.queue.lock().pop_front();
        let Scripted { delay, outcome } = next.unwrap_or(Scripted { delay: None, outcome: Ok(request.prompt.clone()) });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match outcome {
            Ok(response) => {
                (request.on_delta)(&response);
                Ok(BackendResult { response, ..Default::default() })
            }
            Err(e) => Err(e),
        }
    }
}

/// A `Planner` that ignores the backend entirely and hands back a
/// fixed, already-built [`Workflow`] — scenarios need full control
/// over graph shape, not the JSON round trip `BackendPlanner` does.
pub struct FixedPlanner(pub Workflow);

#[async_trait]
impl Planner for FixedPlanner {
    async fn plan(&self, task: &Task, _backend: Arc<dyn BackendAdapter>) -> Result<Workflow, EngineError> {
        let mut workflow = self.0.clone();
        workflow.task_id = Some(task.id.as_str().to_string());
        Ok(workflow)
    }
}

fn task_node(id: &str, name: &str, prompt: &str) -> Node {
    Node {
        id: NodeId::new(id),
        name: name.to_string(),
        config: NodeConfig::Task { prompt: prompt.to_string(), persona: None },
        timeout_ms: None,
        on_error: OnError::Fail,
        retry: RetryPolicy::default(),
    }
}

fn edge(id: &str, from: &str, to: &str) -> Edge {
    Edge { id: EdgeId::new(id), from: NodeId::new(from), to: NodeId::new(to), condition: None, max_loops: None, label: None }
}

/// `start -> a -> b -> end`.
pub fn linear_workflow() -> Workflow {
    let start = Node { id: NodeId::new("start"), name: "start".into(), config: NodeConfig::Start, timeout_ms: None, on_error: OnError::Fail, retry: RetryPolicy::default() };
    let end = Node { id: NodeId::new("end"), name: "end".into(), config: NodeConfig::End, timeout_ms: None, on_error: OnError::Fail, retry: RetryPolicy::default() };
    Workflow {
        id: WorkflowId::new("wf-linear"),
        task_id: None,
        name: "linear".into(),
        description: "run step A then step B".into(),
        nodes: vec![start, task_node("A", "step A", "do step A"), task_node("B", "step B", "do step B"), end],
        edges: vec![edge("e1", "start", "A"), edge("e2", "A", "B"), edge("e3", "B", "end")],
        variables: Default::default(),
        inputs: Default::default(),
        outputs: Default::default(),
        settings: WorkflowSettings::default(),
    }
}

/// `start -> a -> end` (single node, for retry/failure scenarios).
pub fn single_node_workflow() -> Workflow {
    let start = Node { id: NodeId::new("start"), name: "start".into(), config: NodeConfig::Start, timeout_ms: None, on_error: OnError::Fail, retry: RetryPolicy::default() };
    let end = Node { id: NodeId::new("end"), name: "end".into(), config: NodeConfig::End, timeout_ms: None, on_error: OnError::Fail, retry: RetryPolicy::default() };
    Workflow {
        id: WorkflowId::new("wf-single"),
        task_id: None,
        name: "single".into(),
        description: "run step A".into(),
        nodes: vec![start, task_node("A", "step A", "do step A"), end],
        edges: vec![edge("e1", "start", "A"), edge("e2", "A", "end")],
        variables: Default::default(),
        inputs: Default::default(),
        outputs: Default::default(),
        settings: WorkflowSettings::default(),
    }
}

/// `start -> {a, b} -> join -> end`.
pub fn parallel_join_workflow() -> Workflow {
    let start = Node { id: NodeId::new("start"), name: "start".into(), config: NodeConfig::Start, timeout_ms: None, on_error: OnError::Fail, retry: RetryPolicy::default() };
    let join = Node { id: NodeId::new("join"), name: "join".into(), config: NodeConfig::Join, timeout_ms: None, on_error: OnError::Fail, retry: RetryPolicy::default() };
    let end = Node { id: NodeId::new("end"), name: "end".into(), config: NodeConfig::End, timeout_ms: None, on_error: OnError::Fail, retry: RetryPolicy::default() };
    Workflow {
        id: WorkflowId::new("wf-join"),
        task_id: None,
        name: "parallel-join".into(),
        description: "run A and B then join".into(),
        nodes: vec![start, task_node("A", "branch A", "do A"), task_node("B", "branch B", "do B"), join, end],
        edges: vec![
            edge("e1", "start", "A"),
            edge("e2", "start", "B"),
            edge("e3", "A", "join"),
            edge("e4", "B", "join"),
            edge("e5", "join", "end"),
        ],
        variables: Default::default(),
        inputs: Default::default(),
        outputs: Default::default(),
        settings: WorkflowSettings::default(),
    }
}

/// `start -> a -> b -> c -> end` (three serial task nodes, for pause/resume).
pub fn three_node_workflow() -> Workflow {
    let start = Node { id: NodeId::new("start"), name: "start".into(), config: NodeConfig::Start, timeout_ms: None, on_error: OnError::Fail, retry: RetryPolicy::default() };
    let end = Node { id: NodeId::new("end"), name: "end".into(), config: NodeConfig::End, timeout_ms: None, on_error: OnError::Fail, retry: RetryPolicy::default() };
    Workflow {
        id: WorkflowId::new("wf-three"),
        task_id: None,
        name: "three-node".into(),
        description: "run A then B then C".into(),
        nodes: vec![
            start,
            task_node("A", "step A", "do A"),
            task_node("B", "step B", "do B"),
            task_node("C", "step C", "do C"),
            end,
        ],
        edges: vec![edge("e1", "start", "A"), edge("e2", "A", "B"), edge("e3", "B", "C"), edge("e4", "C", "end")],
        variables: Default::default(),
        inputs: Default::default(),
        outputs: Default::default(),
        settings: WorkflowSettings::default(),
    }
}

/// A freshly wired `TaskStore`/`WorkflowQueue`/`TaskExecutor` over a
/// throwaway temp directory, with `workflow` handed out by a
/// [`FixedPlanner`] and `script` driving every `task` node invocation
/// in the order the executor makes them.
pub struct Harness {
    pub _tmp: TempDir,
    pub layout: PathLayout,
    pub store: Arc<TaskStore>,
    pub queue: Arc<WorkflowQueue>,
    pub executor: Arc<TaskExecutor>,
    pub bus: TaskEventBus,
    pub clock: Arc<dyn Clock>,
}

impl Harness {
    pub fn new(workflow: Workflow, script: Vec<Scripted>) -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let layout = PathLayout::new(tmp.path());
        std::fs::create_dir_all(layout.tasks_dir()).expect("create tasks dir");

        let store = Arc::new(TaskStore::new(layout.clone()));
        let queue = Arc::new(WorkflowQueue::new(layout.clone()));
        let backend: Arc<dyn BackendAdapter> = Arc::new(ScriptedBackend::new("scripted", script));
        let backends = BackendRegistry::new().register(backend).with_default("scripted");
        let planner = Arc::new(FixedPlanner(workflow));
        let bus = TaskEventBus::new(1024);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let executor = Arc::new(TaskExecutor::new(store.clone(), queue.clone(), backends, planner, bus.clone(), clock.clone()));

        // Drive the timeline writer for the lifetime of the test so
        // `timeline.json` picks up every published event.
        tokio::spawn(cah_engine::event_bus::run_timeline_writer(bus.clone(), store.clone(), clock.clone()));

        Self { _tmp: tmp, layout, store, queue, executor, bus, clock }
    }

    /// Write a fresh `Pending` task and return it.
    pub fn submit(&self, description: &str) -> Task {
        let now = self.clock.now_ms();
        let id: TaskId = self.store.generate_task_id(&now.to_string());
        let task = Task {
            id,
            title: description.chars().take(72).collect(),
            description: description.to_string(),
            priority: TaskPriority::Medium,
            status: TaskStatus::Pending,
            cwd: PathBuf::from("."),
            assignee: None,
            backend: None,
            model: None,
            cron: None,
            source: TaskSource::User,
            created_at_ms: now,
            updated_at_ms: now,
            paused_at_ms: None,
            pause_reason: None,
        };
        self.store.write_task(&task).expect("write task");
        task
    }

    pub fn read_task(&self, id: &TaskId) -> Task {
        self.store.read_task(id).expect("task exists")
    }

    pub fn read_instance(&self, id: &TaskId) -> cah_core::instance::WorkflowInstance {
        self.store.read_instance(id).expect("instance exists")
    }

    pub fn timeline_event_names(&self, id: &TaskId) -> Vec<String> {
        self.store.read_timeline(id).into_iter().map(|e| e.event).collect()
    }

    pub fn result_md(&self, id: &TaskId) -> String {
        std::fs::read_to_string(self.layout.result_md(id)).expect("result.md exists")
    }
}
