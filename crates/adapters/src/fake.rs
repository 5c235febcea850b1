// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake `BackendAdapter` for tests: returns scripted responses keyed
//! by call order, recording every request it receives.

use crate::backend::{BackendAdapter, BackendError, BackendRequest, BackendResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FakeInvocation {
    pub prompt: String,
    pub model: Option<String>,
}

#[derive(Clone, Default)]
struct FakeState {
    scripted: VecDeque<Result<BackendResult, BackendError>>,
    calls: Vec<FakeInvocation>,
}

/// A `BackendAdapter` driven by a queue of scripted responses. When the
/// queue is exhausted, further calls echo the prompt back as the
/// response (useful when a test only cares about the graph shape).
#[derive(Clone, Default)]
pub struct FakeBackendAdapter {
    name: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackendAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    pub fn push_response(&self, response: impl Into<String>) -> &Self {
        self.state.lock().scripted.push_back(Ok(BackendResult {
            response: response.into(),
            ..Default::default()
        }));
        self
    }

    pub fn push_error(&self, error: BackendError) -> &Self {
        self.state.lock().scripted.push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<FakeInvocation> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl BackendAdapter for FakeBackendAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke<'a>(&self, mut request: BackendRequest<'a>) -> Result<BackendResult, BackendError> {
        let next = {
            let mut state = self.state.lock();
            state.calls.push(FakeInvocation {
                prompt: request.prompt.clone(),
                model: request.model.clone(),
            });
            state.scripted.pop_front()
        };
        match next {
            Some(Ok(result)) => {
                (request.on_delta)(&result.response);
                Ok(result)
            }
            Some(Err(e)) => Err(e),
            None => {
                (request.on_delta)(&request.prompt);
                Ok(BackendResult {
                    response: request.prompt,
                    ..Default::default()
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
