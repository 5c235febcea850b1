// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cah - the AI task orchestrator CLI.

mod color;
mod commands;
mod context;
mod daemon_process;
mod exit_error;
mod output;
mod table;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon, task};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "cah", version, about = "An AI task orchestrator")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new task
    Submit(task::SubmitArgs),
    /// List tasks
    List(task::ListArgs),
    /// Show a task's detail
    Show(task::IdArgs),
    /// View a task's execution log
    Logs(task::LogsArgs),
    /// Show a task's node/cost statistics
    Stats(task::IdArgs),
    /// Resume a paused task (or every paused task with --all)
    Resume(task::ResumeArgs),
    /// Pause a developing task
    Pause(task::ReasonArgs),
    /// Cancel a task
    Stop(task::IdArgs),
    /// Delete a task and its data
    Delete(task::IdArgs),
    /// Mark a task completed
    Complete(task::IdArgs),
    /// Mark a task failed
    Reject(task::ReasonArgs),
    /// Inject an ad hoc node into a running task
    InjectNode(task::InjectNodeArgs),
    /// Send a message to a running task
    Msg(task::MsgArgs),
    /// Manage the persistent runner process
    Daemon {
        #[command(subcommand)]
        command: daemon::DaemonCommand,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e.downcast_ref::<exit_error::ExitError>().map_or(1, |c| c.code);
        eprintln!("Error: {}", format_error(&e));
        std::process::exit(code);
    }
}

/// Format an anyhow error, deduplicating the chain when the top-level
/// message already restates every cause (common with `thiserror`
/// `#[from]` variants).
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();
    let chain_redundant = err.chain().skip(1).all(|cause| top.contains(&cause.to_string()));
    if chain_redundant {
        return top;
    }
    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.output;

    match cli.command {
        Commands::Submit(args) => task::submit(args, format).await,
        Commands::List(args) => task::list(args, format),
        Commands::Show(args) => task::show(args, format),
        Commands::Logs(args) => task::logs(args, format).await,
        Commands::Stats(args) => task::stats(args, format),
        Commands::Resume(args) => task::resume(args, format).await,
        Commands::Pause(args) => task::pause(args, format),
        Commands::Stop(args) => task::stop(args, format),
        Commands::Delete(args) => task::delete(args, format),
        Commands::Complete(args) => task::complete(args, format),
        Commands::Reject(args) => task::reject(args, format),
        Commands::InjectNode(args) => task::inject_node(args, format),
        Commands::Msg(args) => task::msg(args, format),
        Commands::Daemon { command } => daemon::run(command, format),
    }
}
