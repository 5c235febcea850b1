// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete `BackendAdapter`: spawns a configured AI CLI process, feeds
//! it the prompt on stdin, streams stdout lines to the caller's
//! `on_delta`, and returns the accumulated output as the final result.

use crate::backend::{BackendAdapter, BackendError, BackendRequest, BackendResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Drives an external command as a [`BackendAdapter`]. The command is
/// expected to read a prompt on stdin and stream its response on
/// stdout; `{model}` in `args` is substituted with the requested model
/// (or dropped if none was requested).
#[derive(Debug, Clone)]
pub struct SubprocessBackendAdapter {
    name: String,
    program: String,
    args: Vec<String>,
}

impl SubprocessBackendAdapter {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
        }
    }

    fn build_args(&self, model: Option<&str>) -> Vec<String> {
        self.args
            .iter()
            .filter_map(|a| {
                if a == "{model}" {
                    model.map(|m| m.to_string())
                } else {
                    Some(a.clone())
                }
            })
            .collect()
    }
}

#[async_trait]
impl BackendAdapter for SubprocessBackendAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke<'a>(&self, mut request: BackendRequest<'a>) -> Result<BackendResult, BackendError> {
        let args = self.build_args(request.model.as_deref());
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .current_dir(&request.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| BackendError::Config(format!("failed to spawn {}: {e}", self.program)))?;

        let mut stdin = child.stdin.take().ok_or_else(|| BackendError::Config("no stdin".into()))?;
        let prompt = request.prompt.clone();
        let write_task = tokio::spawn(async move {
            let _ = stdin.write_all(prompt.as_bytes()).await;
            let _ = stdin.shutdown().await;
        });

        let stdout = child.stdout.take().ok_or_else(|| BackendError::Config("no stdout".into()))?;
        let mut lines = BufReader::new(stdout).lines();
        let mut response = String::new();

        let timeout = std::time::Duration::from_millis(request.timeout_ms);
        let read_and_wait = async {
            while let Ok(Some(line)) = lines.next_line().await {
                (request.on_delta)(&line);
                if !response.is_empty() {
                    response.push('\n');
                }
                response.push_str(&line);
            }
            child.wait().await
        };

        let status = match tokio::time::timeout(timeout, read_and_wait).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                let _ = child.start_kill();
                return Err(BackendError::Process(None, e.to_string()));
            }
            Err(_) => {
                let _ = child.start_kill();
                return Err(BackendError::Timeout(request.timeout_ms));
            }
        };
        let _ = write_task.await;

        if !status.success() {
            return Err(BackendError::Process(status.code(), response));
        }

        Ok(BackendResult {
            response,
            session_id: None,
            duration_api_ms: None,
            cost_usd: None,
            tool_calls: None,
        })
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
