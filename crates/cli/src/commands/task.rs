// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task lifecycle commands: `submit`, `list`, `show`, `logs`, `stats`,
//! `resume`, `pause`, `stop`, `delete`, `complete`, `reject`,
//! `inject-node`, `msg`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use cah_core::clock::{Clock, SystemClock};
use cah_core::{MessageSource, Task, TaskId, TaskMessage, TaskPriority, TaskSource, TaskStatus};
use cah_daemon::runner;

use crate::context;
use crate::exit_error;
use crate::output::{display_log, format_time_ago, OutputFormat};
use crate::table::{Column, Table};

#[derive(Args)]
pub struct SubmitArgs {
    /// Natural-language description of the task
    pub description: String,
    #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
    pub priority: PriorityArg,
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long)]
    pub backend: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub cwd: Option<PathBuf>,
    /// Run inline and block until the task finishes, instead of
    /// spawning a detached runner.
    #[arg(short = 'F', long)]
    pub foreground: bool,
    /// Write the task but do not spawn a runner for it.
    #[arg(long)]
    pub no_run: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for TaskPriority {
    fn from(p: PriorityArg) -> Self {
        match p {
            PriorityArg::Low => TaskPriority::Low,
            PriorityArg::Medium => TaskPriority::Medium,
            PriorityArg::High => TaskPriority::High,
        }
    }
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub cwd: Option<PathBuf>,
    /// Re-render every 2s instead of printing once
    #[arg(long)]
    pub watch: bool,
}

#[derive(Args)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Args)]
pub struct LogsArgs {
    pub id: String,
    #[arg(short, long)]
    pub follow: bool,
}

#[derive(Args)]
pub struct ResumeArgs {
    pub id: Option<String>,
    #[arg(long, conflicts_with = "id")]
    pub all: bool,
}

#[derive(Args)]
pub struct ReasonArgs {
    pub id: String,
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Args)]
pub struct InjectNodeArgs {
    pub id: String,
    pub prompt: String,
    #[arg(long)]
    pub persona: Option<String>,
}

#[derive(Args)]
pub struct MsgArgs {
    pub id: String,
    pub text: String,
}

pub async fn submit(args: SubmitArgs, format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;
    let clock = SystemClock;

    let now = clock.now_ms();
    let timestamp = chrono::DateTime::from_timestamp_millis(now as i64)
        .unwrap_or_default()
        .format("%Y%m%d-%H%M%S")
        .to_string();
    let id = store.generate_task_id(&timestamp);
    let cwd = match args.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let task = Task {
        id: id.clone(),
        title: args.description.chars().take(72).collect(),
        description: args.description,
        priority: args.priority.into(),
        status: TaskStatus::Pending,
        cwd,
        assignee: args.assignee,
        backend: args.backend,
        model: args.model,
        cron: None,
        source: TaskSource::User,
        created_at_ms: now,
        updated_at_ms: now,
        paused_at_ms: None,
        pause_reason: None,
    };
    store.write_task(&task)?;

    if args.foreground {
        let queue = context::queue(&layout);
        let executor = context::executor(store, queue);
        executor.execute_task(task, cah_engine::ExecuteOptions::default()).await?;
    } else if !args.no_run {
        runner::spawn_detached(layout.root(), None)?;
    }

    match format {
        OutputFormat::Text => println!("{}", id),
        OutputFormat::Json => println!("{}", serde_json::json!({"id": id.as_str()})),
    }
    Ok(())
}

pub fn list(args: ListArgs, format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;

    let render = || -> Result<()> {
        let mut tasks = store.list_tasks();
        if let Some(status) = &args.status {
            tasks.retain(|t| format!("{:?}", t.status).eq_ignore_ascii_case(status));
        }
        if let Some(cwd) = &args.cwd {
            tasks.retain(|t| &t.cwd == cwd);
        }

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            }
            OutputFormat::Text => {
                let mut table = Table::new(vec![
                    Column::left("ID"),
                    Column::status("STATUS"),
                    Column::left("PRIORITY"),
                    Column::left("TITLE").with_max(60),
                    Column::muted("CWD"),
                    Column::muted("AGE"),
                ]);
                for t in &tasks {
                    table.row(vec![
                        t.id.short(12).to_string(),
                        format!("{:?}", t.status).to_lowercase(),
                        format!("{:?}", t.priority).to_lowercase(),
                        t.title.clone(),
                        t.cwd.display().to_string(),
                        format_time_ago(t.created_at_ms),
                    ]);
                }
                let mut out = std::io::stdout();
                table.render(&mut out);
                if tasks.is_empty() {
                    println!("No tasks");
                }
            }
        }
        Ok(())
    };

    if !args.watch {
        return render();
    }
    loop {
        print!("\x1b[2J\x1b[H");
        render()?;
        std::thread::sleep(std::time::Duration::from_secs(2));
    }
}

pub fn show(args: IdArgs, format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;
    let id = resolve(&store, &args.id)?;
    let task = store.read_task(&id).ok_or_else(|| exit_error::from_core(cah_core::CoreError::NotFound(id.to_string())))?;
    let instance = store.read_instance(&id);

    if matches!(format, OutputFormat::Json) {
        let out = serde_json::json!({"task": task, "instance": instance});
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}  {}", task.id, format!("{:?}", task.status).to_lowercase());
    println!("{}", task.title);
    println!("cwd: {}", task.cwd.display());
    if let Some(reason) = &task.pause_reason {
        println!("paused: {}", reason);
    }

    let Some(instance) = instance else {
        println!("(workflow not yet planned)");
        return Ok(());
    };

    let mut table = Table::new(vec![Column::left("NODE"), Column::status("STATUS"), Column::right("ATTEMPTS")]);
    let mut node_ids: Vec<_> = instance.node_states.keys().collect();
    node_ids.sort();
    for node_id in node_ids {
        let state = &instance.node_states[node_id];
        table.row(vec![node_id.as_str().to_string(), format!("{:?}", state.status).to_lowercase(), state.attempts.to_string()]);
    }
    let mut out = std::io::stdout();
    table.render(&mut out);
    Ok(())
}

pub async fn logs(args: LogsArgs, format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;
    let id = resolve(&store, &args.id)?;
    let path = layout.execution_log(&id);
    let content = std::fs::read_to_string(&path).unwrap_or_default();
    display_log(&path, &content, args.follow, format, "task", id.as_str()).await
}

pub fn stats(args: IdArgs, format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;
    let id = resolve(&store, &args.id)?;
    let stats: cah_engine::stats::Stats = store.read_derived(&layout.stats_json(&id)).unwrap_or_default();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("nodes: {} total, {} done, {} failed, {} running, {} pending", stats.total_nodes, stats.done, stats.failed, stats.running, stats.pending);
            if let Some(ms) = stats.duration_ms {
                println!("duration: {}ms", ms);
            }
            if stats.cost_usd > 0.0 {
                println!("cost: ${:.4}", stats.cost_usd);
            }
        }
    }
    Ok(())
}

pub async fn resume(args: ResumeArgs, format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;

    let ids = if args.all {
        store.list_tasks().into_iter().filter(|t| t.status == TaskStatus::Paused).map(|t| t.id).collect()
    } else {
        let Some(id) = &args.id else {
            anyhow::bail!(exit_error::ExitError::new(cah_core::exit_code::USAGE_ERROR, "resume requires an id or --all"));
        };
        vec![resolve(&store, id)?]
    };

    for id in ids {
        transition(&store, &id, TaskStatus::Developing, |t| {
            t.pause_reason = None;
        })?;
        runner::spawn_detached(layout.root(), Some(&id))?;
        if matches!(format, OutputFormat::Text) {
            println!("resumed {}", id);
        }
    }
    Ok(())
}

pub fn pause(args: ReasonArgs, _format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;
    let id = resolve(&store, &args.id)?;
    transition(&store, &id, TaskStatus::Paused, |t| {
        t.pause_reason = args.reason.clone();
    })?;
    let now = SystemClock.now_ms();
    store.with_instance(&id, |instance| {
        instance.status = cah_core::InstanceStatus::Paused;
        instance.paused_at_ms = Some(now);
    })?;
    println!("paused {}", id);
    Ok(())
}

pub fn stop(args: IdArgs, _format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;
    let id = resolve(&store, &args.id)?;
    transition(&store, &id, TaskStatus::Cancelled, |_| {})?;
    store.with_instance(&id, |instance| {
        instance.status = cah_core::InstanceStatus::Cancelled;
    })?;
    println!("stopped {}", id);
    Ok(())
}

pub fn complete(args: IdArgs, _format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;
    let id = resolve(&store, &args.id)?;
    transition(&store, &id, TaskStatus::Completed, |_| {})?;
    println!("completed {}", id);
    Ok(())
}

pub fn reject(args: ReasonArgs, _format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;
    let id = resolve(&store, &args.id)?;
    transition(&store, &id, TaskStatus::Failed, |_| {})?;
    let reason = args.reason.clone();
    store.with_instance(&id, |instance| {
        instance.error = reason.or_else(|| instance.error.clone());
    })?;
    println!("rejected {}", id);
    Ok(())
}

pub fn delete(args: IdArgs, _format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;
    let id = resolve(&store, &args.id)?;

    if let Some(workflow) = store.read_workflow(&id) {
        let queue = context::queue(&layout);
        queue.remove_workflow_jobs(&workflow.id)?;
    }
    std::fs::remove_dir_all(layout.task_dir(&id))?;
    println!("deleted {}", id);
    Ok(())
}

pub fn inject_node(args: InjectNodeArgs, format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;
    let id = resolve(&store, &args.id)?;
    let queue = context::queue(&layout);
    let executor = context::executor(store, queue);
    let node_id = executor.inject_node(&id, args.prompt, args.persona)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({"node_id": node_id.as_str()})),
        OutputFormat::Text => println!("injected {}", node_id),
    }
    Ok(())
}

pub fn msg(args: MsgArgs, _format: OutputFormat) -> Result<()> {
    let layout = context::layout();
    let store = context::store(&layout)?;
    let id = resolve(&store, &args.id)?;
    let clock = SystemClock;

    store.append_message(
        &id,
        TaskMessage {
            id: cah_core::MessageId::new(uuid::Uuid::new_v4().to_string()),
            task_id: id.clone(),
            content: args.text,
            source: MessageSource::Cli,
            consumed: false,
            timestamp_ms: clock.now_ms(),
        },
    )?;
    println!("message queued for {}", id);
    Ok(())
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;

fn resolve(store: &cah_storage::TaskStore, prefix: &str) -> Result<TaskId> {
    store.resolve_prefix(prefix).map_err(exit_error::from_lookup)
}

/// Apply a task status transition under the normal validation rules,
/// running `mutate` on the task first so callers can set ancillary
/// fields (pause reason, etc.) in the same write.
fn transition(store: &cah_storage::TaskStore, id: &TaskId, to: TaskStatus, mutate: impl FnOnce(&mut Task)) -> Result<()> {
    let mut task = store.read_task(id).ok_or_else(|| exit_error::from_core(cah_core::CoreError::NotFound(id.to_string())))?;
    mutate(&mut task);
    let clock = SystemClock;
    task.transition_to(to, clock.now_ms()).map_err(exit_error::from_core)?;
    store.write_task(&task)?;
    Ok(())
}

