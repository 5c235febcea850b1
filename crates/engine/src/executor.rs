// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TaskExecutor (C10): binds a [`Task`] to a running [`WorkflowInstance`],
//! owns the [`NodeWorker`] pool for its lifetime, and is the
//! [`JobProcessor`] that dispatches every dequeued job — `task` and
//! `human` directly (they need an async backend round trip or queue
//! access respectively), everything else through [`handlers::dispatch`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;

use cah_adapters::{BackendError, BackendRegistry, BackendRequest};
use cah_core::clock::Clock;
use cah_core::error::ErrorCategory;
use cah_core::event::Event;
use cah_core::instance::{InstanceId, InstanceStatus, NodeStatus, WorkflowInstance};
use cah_core::job::{Job, JobData};
use cah_core::task::{Task, TaskId, TaskStatus};
use cah_core::workflow::{NodeConfig, NodeId, OnError, Workflow};
use cah_core::TaskMessage;
use cah_queue::{EnqueueOptions, WorkflowQueue};
use cah_storage::TaskStore;

use crate::error::EngineError;
use crate::eval::EvalContext;
use crate::handlers::{self, HandlerContext, HandlerOutcome, HandlerStatus};
use crate::injection;
use crate::planner::Planner;
use crate::result_md;
use crate::stats;
use crate::state_manager as sm;
use crate::worker::{JobProcessor, NodeWorker, NodeWorkerConfig};

#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    pub concurrency: usize,
    pub resume: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self { concurrency: 3, resume: false }
    }
}

fn outputs_by_name(instance: &WorkflowInstance) -> HashMap<String, JsonValue> {
    instance.outputs.iter().map(|(k, v)| (k.as_str().to_string(), v.clone())).collect()
}

fn render_template(template: &str, outputs: &HashMap<String, JsonValue>) -> String {
    let mut rendered = template.to_string();
    for (node_id, value) in outputs {
        let needle = format!("{{{{outputs.{node_id}}}}}");
        if rendered.contains(&needle) {
            let text = value.get("response").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| value.to_string());
            rendered = rendered.replace(&needle, &text);
        }
    }
    rendered
}

fn classify_backend_error(err: &BackendError) -> ErrorCategory {
    match err {
        BackendError::Timeout(_) => ErrorCategory::Transient,
        BackendError::Cancelled => ErrorCategory::Transient,
        BackendError::Process(_, _) => ErrorCategory::Unknown,
        BackendError::Config(_) => ErrorCategory::Permanent,
    }
}

/// Binds one task to its running instance: plans (or resumes), drives
/// the node worker pool, and finalizes the task once the instance
/// settles. One `TaskExecutor` can drive many tasks over its lifetime
/// (it is also the shared [`JobProcessor`] every [`NodeWorker`] it
/// spawns reports back to).
pub struct TaskExecutor {
    store: Arc<TaskStore>,
    queue: Arc<WorkflowQueue>,
    backends: BackendRegistry,
    planner: Arc<dyn Planner>,
    bus: crate::event_bus::TaskEventBus,
    clock: Arc<dyn Clock>,
    instance_tasks: Mutex<HashMap<InstanceId, TaskId>>,
    poll_interval: Duration,
}

impl TaskExecutor {
    pub fn new(
        store: Arc<TaskStore>,
        queue: Arc<WorkflowQueue>,
        backends: BackendRegistry,
        planner: Arc<dyn Planner>,
        bus: crate::event_bus::TaskEventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            queue,
            backends,
            planner,
            bus,
            clock,
            instance_tasks: Mutex::new(HashMap::new()),
            poll_interval: Duration::from_millis(500),
        }
    }

    #[cfg(test)]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Plan (or resume) `task`, run its workflow to completion, and
    /// finalize it — steps 1-5 of §4.10. Returns once the instance has
    /// settled into a terminal state (or was paused/cancelled out from
    /// under it by another process via the shared files).
    pub async fn execute_task(self: Arc<Self>, mut task: Task, opts: ExecuteOptions) -> Result<(), EngineError> {
        let workflow = if opts.resume {
            self.prepare_resume(&task)?
        } else {
            self.prepare_fresh(&mut task).await?
        };
        let Some(instance) = self.store.read_instance(&task.id) else {
            return Err(EngineError::InvalidPlan("instance missing right after preparation".into()));
        };

        self.instance_tasks.lock().insert(instance.id.clone(), task.id.clone());
        self.bus.publish(Event::WorkflowStarted {
            task_id: task.id.clone(),
            workflow_id: workflow.id.clone(),
            instance_id: instance.id.clone(),
        });

        if task.status != TaskStatus::Developing {
            task.transition_to(TaskStatus::Developing, self.clock.now_ms())?;
            self.store.write_task(&task)?;
        }

        let worker = Arc::new(NodeWorker::new(
            self.queue.clone(),
            self.clone(),
            Some(instance.id.clone()),
            NodeWorkerConfig {
                concurrency: opts.concurrency,
                poll_interval: self.poll_interval,
            },
            self.clock.clone(),
        ));
        let worker_handle = worker.clone();
        let run_handle = tokio::spawn(async move { worker_handle.start().await });

        loop {
            tokio::time::sleep(self.poll_interval).await;
            let Some(current) = self.store.read_instance(&task.id) else { break };
            if !matches!(current.status, InstanceStatus::Running) {
                break;
            }
        }
        worker.stop();
        let _ = run_handle.await;

        self.finalize_task(&mut task, &workflow).await?;
        self.instance_tasks.lock().remove(&instance.id);
        Ok(())
    }

    async fn prepare_fresh(&self, task: &mut Task) -> Result<Workflow, EngineError> {
        task.transition_to(TaskStatus::Planning, self.clock.now_ms())?;
        self.store.write_task(task)?;

        let backend = self
            .backends
            .resolve(None, task.backend.as_deref())
            .ok_or(EngineError::NoBackendAvailable)?;
        let mut workflow = self.planner.plan(task, backend).await?;
        workflow.task_id = Some(task.id.as_str().to_string());
        self.store.write_workflow(&task.id, &workflow)?;

        let instance_id = InstanceId::new(format!("inst-{}", task.id));
        let mut instance = WorkflowInstance::new(instance_id, workflow.id.clone(), workflow.nodes.iter().map(|n| n.id.clone()));
        instance.status = InstanceStatus::Running;
        instance.started_at_ms = Some(self.clock.now_ms());
        self.store.write_instance(&task.id, &instance)?;

        let now = self.clock.now_ms();
        let start_id = workflow.start_node().map(|n| n.id.clone()).unwrap_or_else(|| NodeId::new("start"));
        let maybe = self.store.with_instance(&task.id, |inst| {
            sm::mark_node_done(inst, &start_id, None, now);
            sm::advance(&workflow, inst, &[start_id.clone()])
        })?;
        let jobs = maybe.ok_or_else(|| EngineError::InvalidPlan("instance vanished before initial readiness pass".into()))?;
        sm::enqueue_ready(&self.queue, jobs, now);

        Ok(workflow)
    }

    /// Resume a paused (or interrupted) task: every node left `running`
    /// goes back to `pending` (its in-flight job, if any, is stale and
    /// will simply be dropped by a worker that notices the instance is
    /// no longer running) and the instance status returns to `running`.
    fn prepare_resume(&self, task: &Task) -> Result<Workflow, EngineError> {
        let workflow = self
            .store
            .read_workflow(&task.id)
            .ok_or_else(|| EngineError::InvalidPlan(format!("no workflow to resume for {}", task.id)))?;

        let reset: Vec<NodeId> = self
            .store
            .with_instance(&task.id, |instance| {
                let reset: Vec<NodeId> = instance
                    .node_states
                    .iter()
                    .filter(|(_, s)| s.status == NodeStatus::Running)
                    .map(|(id, _)| id.clone())
                    .collect();
                for id in &reset {
                    sm::reset_node_for_retry(instance, id);
                }
                instance.status = InstanceStatus::Running;
                instance.paused_at_ms = None;
                reset
            })?
            .ok_or_else(|| EngineError::InvalidPlan(format!("no instance to resume for {}", task.id)))?;

        let now = self.clock.now_ms();
        let to_enqueue = self
            .store
            .with_instance(&task.id, |instance| {
                let ctx = EvalContext {
                    variables: instance.variables.clone(),
                    outputs: outputs_by_name(instance),
                };
                let ready: Vec<NodeId> = sm::ready_nodes(&workflow, instance, &ctx).into_iter().map(|n| n.id.clone()).collect();
                ready
                    .into_iter()
                    .chain(reset.into_iter())
                    .map(|node_id| JobData { workflow_id: workflow.id.clone(), instance_id: instance.id.clone(), node_id })
                    .collect::<Vec<_>>()
            })?
            .ok_or_else(|| EngineError::InvalidPlan(format!("no instance to resume for {}", task.id)))?;
        sm::enqueue_ready(&self.queue, to_enqueue, now);

        Ok(workflow)
    }

    async fn finalize_task(&self, task: &mut Task, workflow: &Workflow) -> Result<(), EngineError> {
        let Some(instance) = self.store.read_instance(&task.id) else { return Ok(()) };

        let computed = stats::compute(workflow, &instance);
        self.store.write_derived(&self.store.layout().stats_json(&task.id), &computed)?;
        let markdown = result_md::render(task, workflow, &instance);
        self.store.write_result_md(&task.id, &markdown)?;

        let now = self.clock.now_ms();
        match instance.status {
            InstanceStatus::Completed => {
                task.transition_to(TaskStatus::Completed, now)?;
                self.bus.publish(Event::TaskCompleted { task_id: task.id.clone() });
                let duration_ms = instance
                    .started_at_ms
                    .zip(instance.completed_at_ms)
                    .map(|(s, e)| e.saturating_sub(s))
                    .unwrap_or(0);
                self.bus.publish(Event::WorkflowCompleted {
                    task_id: task.id.clone(),
                    instance_id: instance.id.clone(),
                    duration_ms,
                });
            }
            InstanceStatus::Failed => {
                let error = instance.error.clone().unwrap_or_else(|| "workflow failed".into());
                task.transition_to(TaskStatus::Failed, now)?;
                self.bus.publish(Event::TaskFailed { task_id: task.id.clone(), error: error.clone() });
                self.bus.publish(Event::WorkflowFailed { task_id: task.id.clone(), instance_id: instance.id.clone(), error });
            }
            InstanceStatus::Paused => {
                if task.status != TaskStatus::Paused {
                    task.transition_to(TaskStatus::Paused, now)?;
                }
            }
            InstanceStatus::Cancelled => {
                if task.status != TaskStatus::Cancelled {
                    task.transition_to(TaskStatus::Cancelled, now)?;
                }
            }
            InstanceStatus::Running | InstanceStatus::Pending => {}
        }
        self.store.write_task(task)?;
        Ok(())
    }

    /// Splice a new `task` node into a live (or paused) instance's
    /// workflow (§4.8), anchored after whatever is currently running or
    /// most recently finished.
    pub fn inject_node(&self, task_id: &TaskId, prompt: String, persona: Option<String>) -> Result<NodeId, EngineError> {
        let mut workflow = self
            .store
            .read_workflow(task_id)
            .ok_or_else(|| EngineError::Core(cah_core::error::CoreError::NotFound(format!("workflow for task {task_id}"))))?;
        let now = self.clock.now_ms();

        let outcome = self
            .store
            .with_instance(task_id, |instance| injection::inject_task_node(&mut workflow, instance, prompt, persona))?
            .ok_or_else(|| EngineError::Core(cah_core::error::CoreError::NotFound(format!("instance for task {task_id}"))))?;
        let (new_id, jobs) = outcome?;
        sm::enqueue_ready(&self.queue, jobs, now);

        self.store.write_workflow(task_id, &workflow)?;
        Ok(new_id)
    }

    async fn process_job(&self, job: Job) -> Result<(), EngineError> {
        let task_id = match self.instance_tasks.lock().get(&job.data.instance_id).cloned() {
            Some(id) => id,
            None => {
                tracing::warn!(instance_id = %job.data.instance_id, "dequeued a job for an instance with no owning task, dropping");
                self.queue.complete(&job.id)?;
                return Ok(());
            }
        };

        let Some(workflow) = self.store.read_workflow(&task_id) else {
            self.queue.complete(&job.id)?;
            return Ok(());
        };
        let Some(node) = workflow.node(&job.data.node_id).cloned() else {
            self.queue.complete(&job.id)?;
            return Ok(());
        };

        let now = self.clock.now_ms();
        let snapshot = self
            .store
            .with_instance(&task_id, |instance| {
                if instance.status != InstanceStatus::Running {
                    return None;
                }
                sm::mark_node_running(instance, &node.id, now);
                Some((instance.variables.clone(), outputs_by_name(instance), instance.loop_counts.clone()))
            })?
            .flatten();

        let Some((variables, outputs, loop_counts)) = snapshot else {
            // The instance is no longer running (paused/cancelled from
            // under us, or already gone): drop the stale job silently.
            // resume()/cancel() are responsible for re-deriving
            // readiness from scratch.
            self.queue.complete(&job.id)?;
            return Ok(());
        };

        let messages = self.store.drain_unconsumed_messages(&task_id).unwrap_or_default();

        self.bus.publish(Event::NodeStarted { instance_id: job.data.instance_id.clone(), node_id: node.id.clone() });

        match &node.config {
            NodeConfig::Human { .. } => {
                self.queue.mark_waiting_human(&job.id)?;
                self.store.with_instance(&task_id, |instance| sm::mark_node_waiting(instance, &node.id))?;
                self.bus.publish(Event::NodeWaiting { instance_id: job.data.instance_id.clone(), node_id: node.id.clone() });
                Ok(())
            }
            NodeConfig::Task { prompt, persona } => {
                self.run_task_node(&task_id, &workflow, &node, &job, prompt, persona.as_deref(), &outputs, &messages).await
            }
            _ => {
                let ctx = HandlerContext {
                    eval: EvalContext { variables, outputs },
                    now_ms: now,
                    loop_counts: &loop_counts,
                };
                let outcome = handlers::dispatch(&node, &ctx);
                self.apply_outcome(&task_id, &workflow, &node, &job, outcome).await
            }
        }
    }

    async fn run_task_node(
        &self,
        task_id: &TaskId,
        workflow: &Workflow,
        node: &cah_core::workflow::Node,
        job: &Job,
        prompt_template: &str,
        persona: Option<&str>,
        outputs: &HashMap<String, JsonValue>,
        messages: &[TaskMessage],
    ) -> Result<(), EngineError> {
        let Some(task) = self.store.read_task(task_id) else {
            return self
                .apply_outcome(
                    task_id,
                    workflow,
                    node,
                    job,
                    HandlerOutcome {
                        status: Some(HandlerStatus::Failed { error: "task record missing".into(), category: ErrorCategory::Permanent }),
                        ..Default::default()
                    },
                )
                .await;
        };

        let Some(backend) = self.backends.resolve(None, task.backend.as_deref()) else {
            return self
                .apply_outcome(
                    task_id,
                    workflow,
                    node,
                    job,
                    HandlerOutcome {
                        status: Some(HandlerStatus::Failed { error: "no backend available".into(), category: ErrorCategory::Permanent }),
                        ..Default::default()
                    },
                )
                .await;
        };

        let mut prompt = String::new();
        if let Some(persona) = persona {
            prompt.push_str(persona);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&render_template(prompt_template, outputs));
        if !messages.is_empty() {
            prompt.push_str("\n\n## Messages\n\n");
            for message in messages {
                prompt.push_str("- ");
                prompt.push_str(&message.content);
                prompt.push('\n');
            }
        }

        let node_id = node.id.clone();
        let task_id_for_log = task_id.clone();
        let store_for_log = self.store.clone();
        let on_delta: cah_adapters::OnDelta = Box::new(move |chunk: &str| {
            let _ = store_for_log.append_execution_log(&task_id_for_log, &format!("[{node_id}] {chunk}"));
        });

        let timeout_ms = node.timeout_ms();
        let request = BackendRequest {
            prompt,
            model: task.model.clone(),
            cwd: task.cwd.clone(),
            timeout_ms,
            on_delta,
        };

        let outcome = match tokio::time::timeout(Duration::from_millis(timeout_ms), backend.invoke(request)).await {
            Ok(Ok(result)) => HandlerOutcome {
                status: Some(HandlerStatus::Done),
                output: Some(serde_json::json!({
                    "response": result.response,
                    "session_id": result.session_id,
                    "duration_api_ms": result.duration_api_ms,
                    "cost_usd": result.cost_usd,
                    "tool_calls": result.tool_calls,
                })),
                ..Default::default()
            },
            Ok(Err(err)) => HandlerOutcome {
                status: Some(HandlerStatus::Failed { error: err.to_string(), category: classify_backend_error(&err) }),
                ..Default::default()
            },
            Err(_elapsed) => HandlerOutcome {
                status: Some(HandlerStatus::Failed {
                    error: format!("node timed out after {timeout_ms}ms"),
                    category: ErrorCategory::Transient,
                }),
                ..Default::default()
            },
        };

        self.apply_outcome(task_id, workflow, node, job, outcome).await
    }

    async fn apply_outcome(&self, task_id: &TaskId, workflow: &Workflow, node: &cah_core::workflow::Node, job: &Job, outcome: HandlerOutcome) -> Result<(), EngineError> {
        let now = self.clock.now_ms();
        match outcome.status.clone() {
            Some(HandlerStatus::Retry { delay_ms }) => {
                self.store.with_instance(task_id, |instance| sm::apply_variable_updates(instance, &outcome.variable_updates))?;
                self.queue.complete(&job.id)?;
                self.queue.enqueue(job.data.clone(), job.attempt, now, EnqueueOptions { delay_ms, priority: job.priority, max_attempts: job.max_attempts })?;
                Ok(())
            }
            Some(HandlerStatus::WaitingHuman) => {
                self.queue.mark_waiting_human(&job.id)?;
                self.store.with_instance(task_id, |instance| {
                    sm::apply_variable_updates(instance, &outcome.variable_updates);
                    sm::mark_node_waiting(instance, &node.id);
                })?;
                self.bus.publish(Event::NodeWaiting { instance_id: job.data.instance_id.clone(), node_id: node.id.clone() });
                Ok(())
            }
            Some(HandlerStatus::Done) => self.finish_node_success(task_id, workflow, node, job, outcome).await,
            Some(HandlerStatus::Failed { error, category }) => self.finish_node_failure(task_id, workflow, node, job, error, category, outcome.variable_updates).await,
            None => {
                self.finish_node_failure(task_id, workflow, node, job, "handler returned no status".into(), ErrorCategory::Unknown, outcome.variable_updates)
                    .await
            }
        }
    }

    async fn finish_node_success(&self, task_id: &TaskId, workflow: &Workflow, node: &cah_core::workflow::Node, job: &Job, outcome: HandlerOutcome) -> Result<(), EngineError> {
        let now = self.clock.now_ms();
        let mut completion = None;
        let jobs = self
            .store
            .with_instance(task_id, |instance| {
                sm::apply_variable_updates(instance, &outcome.variable_updates);
                for skip in &outcome.skip_nodes {
                    sm::mark_node_skipped(instance, skip, now);
                }
                sm::mark_node_done(instance, &node.id, outcome.output.clone(), now);

                let mut frontier = vec![node.id.clone()];
                frontier.extend(outcome.skip_nodes.iter().cloned());
                let jobs = sm::advance(workflow, instance, &frontier);

                if let NodeConfig::Loop { body_nodes, .. } | NodeConfig::Foreach { body_nodes, .. } = &node.config {
                    let still_looping = instance.outputs.get(&node.id).and_then(|v| v.as_bool()).unwrap_or(false);
                    if still_looping {
                        let mut ids = body_nodes.clone();
                        ids.push(node.id.clone());
                        sm::reset_for_next_iteration(instance, &ids);
                    }
                }

                completion = sm::check_completion(workflow, instance);
                if let Some(status) = completion {
                    instance.status = status;
                    instance.completed_at_ms = Some(now);
                }
                jobs
            })?
            .unwrap_or_default();

        // `instance.json` is durably written by `with_instance` above
        // before any of these newly-ready nodes reach `queue.json`.
        sm::enqueue_ready(&self.queue, jobs, now);

        self.queue.complete(&job.id)?;
        self.bus.publish(Event::NodeCompleted { instance_id: job.data.instance_id.clone(), node_id: node.id.clone() });
        Ok(())
    }

    async fn finish_node_failure(
        &self,
        task_id: &TaskId,
        workflow: &Workflow,
        node: &cah_core::workflow::Node,
        job: &Job,
        error: String,
        category: ErrorCategory,
        variable_updates: HashMap<String, JsonValue>,
    ) -> Result<(), EngineError> {
        let now = self.clock.now_ms();

        if category.is_retryable() && job.attempt < node.retry.max_attempts {
            let delay = node.retry.backoff_for_attempt(job.attempt + 1);
            self.store.with_instance(task_id, |instance| {
                sm::apply_variable_updates(instance, &variable_updates);
                if let Some(state) = instance.node_states.get_mut(&node.id) {
                    state.last_error = Some(error.clone());
                    state.last_error_category = Some(category);
                }
            })?;
            self.queue.complete(&job.id)?;
            self.queue.enqueue(
                job.data.clone(),
                job.attempt + 1,
                now,
                EnqueueOptions { delay_ms: delay, priority: job.priority, max_attempts: node.retry.max_attempts },
            )?;
            self.bus.publish(Event::NodeFailed { instance_id: job.data.instance_id.clone(), node_id: node.id.clone(), error });
            return Ok(());
        }

        let mut completion = None;
        let jobs = self
            .store
            .with_instance(task_id, |instance| {
                sm::apply_variable_updates(instance, &variable_updates);
                let jobs = match node.on_error {
                    OnError::Fail => {
                        sm::mark_node_failed(instance, &node.id, error.clone(), category, now);
                        instance.error.get_or_insert_with(|| format!("node {} failed: {error}", node.id));
                        Vec::new()
                    }
                    OnError::Skip => {
                        sm::mark_node_skipped(instance, &node.id, now);
                        sm::advance(workflow, instance, &[node.id.clone()])
                    }
                    OnError::Continue => {
                        sm::mark_node_done(instance, &node.id, None, now);
                        sm::advance(workflow, instance, &[node.id.clone()])
                    }
                };
                completion = sm::check_completion(workflow, instance);
                if let Some(status) = completion {
                    instance.status = status;
                    instance.completed_at_ms = Some(now);
                }
                jobs
            })?
            .unwrap_or_default();
        sm::enqueue_ready(&self.queue, jobs, now);

        self.queue.complete(&job.id)?;
        self.bus.publish(Event::NodeFailed { instance_id: job.data.instance_id.clone(), node_id: node.id.clone(), error });
        Ok(())
    }
}

#[async_trait]
impl JobProcessor for TaskExecutor {
    async fn process(&self, job: Job) {
        if let Err(err) = self.process_job(job).await {
            tracing::error!(error = %err, "job processing failed");
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
