// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `BackendAdapter` contract (C14): the boundary `cah-engine`'s
//! `task` node handler calls through to get an AI backend CLI process
//! to actually do the work a node describes. The core never parses a
//! backend's internal protocol — only `response` and the optional
//! metrics on [`BackendResult`] are consumed.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// A streamed chunk of backend output, forwarded to `execution.log` as
/// it arrives. Only the final [`BackendResult::response`] is persisted
/// into `instance.outputs`.
pub type OnDelta<'a> = Box<dyn FnMut(&str) + Send + 'a>;

pub struct BackendRequest<'a> {
    pub prompt: String,
    pub model: Option<String>,
    pub cwd: PathBuf,
    pub timeout_ms: u64,
    pub on_delta: OnDelta<'a>,
}

#[derive(Debug, Clone, Default)]
pub struct BackendResult {
    pub response: String,
    pub session_id: Option<String>,
    pub duration_api_ms: Option<u64>,
    pub cost_usd: Option<f64>,
    pub tool_calls: Option<u32>,
}

#[derive(Debug, Error, Clone)]
pub enum BackendError {
    #[error("backend timed out after {0}ms")]
    Timeout(u64),
    #[error("backend invocation cancelled")]
    Cancelled,
    #[error("backend process error (exit code {0:?}): {1}")]
    Process(Option<i32>, String),
    #[error("backend configuration error: {0}")]
    Config(String),
}

/// A named external AI backend. Multiple backends may be registered;
/// one is chosen per node via task override -> task-level default ->
/// config default (see `BackendRegistry`).
#[async_trait]
pub trait BackendAdapter: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn invoke<'a>(&self, request: BackendRequest<'a>) -> Result<BackendResult, BackendError>;
}

/// Selects a backend by name, falling back to a configured default.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn BackendAdapter>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, adapter: Arc<dyn BackendAdapter>) -> Self {
        self.backends.push(adapter);
        self
    }

    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    /// Resolve per §4.14: task override -> task-level default -> config default.
    pub fn resolve(&self, override_name: Option<&str>, task_default: Option<&str>) -> Option<Arc<dyn BackendAdapter>> {
        let wanted = override_name.or(task_default).or(self.default_name.as_deref());
        match wanted {
            Some(name) => self.backends.iter().find(|b| b.name() == name).cloned(),
            None => self.backends.first().cloned(),
        }
    }
}
