// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cah daemon` - start/stop/restart/status for the persistent runner.

use anyhow::Result;
use clap::Subcommand;

use crate::context;
use crate::daemon_process;
use crate::output::OutputFormat;

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the persistent runner
    Start,
    /// Stop the persistent runner
    Stop,
    /// Stop then start the persistent runner
    Restart,
    /// Report whether a runner is currently alive
    Status,
}

pub fn run(cmd: DaemonCommand, format: OutputFormat) -> Result<()> {
    let layout = context::layout();

    match cmd {
        DaemonCommand::Start => {
            if let Some(pid) = daemon_process::is_running(&layout) {
                println!("cahd already running (pid {pid})");
                return Ok(());
            }
            let pid = cah_daemon::spawn_persistent(layout.root())?;
            println!("cahd started (pid {pid})");
        }
        DaemonCommand::Stop => {
            if daemon_process::stop(&layout) {
                println!("cahd stopped");
            } else {
                anyhow::bail!(crate::exit_error::ExitError::new(cah_core::exit_code::GENERIC_FAILURE, "cahd did not stop within the timeout"));
            }
        }
        DaemonCommand::Restart => {
            daemon_process::stop(&layout);
            let pid = cah_daemon::spawn_persistent(layout.root())?;
            println!("cahd restarted (pid {pid})");
        }
        DaemonCommand::Status => match daemon_process::is_running(&layout) {
            Some(pid) => match format {
                OutputFormat::Json => println!("{}", serde_json::json!({"running": true, "pid": pid})),
                OutputFormat::Text => println!("running (pid {pid})"),
            },
            None => match format {
                OutputFormat::Json => println!("{}", serde_json::json!({"running": false})),
                OutputFormat::Text => println!("not running"),
            },
        },
    }
    Ok(())
}
