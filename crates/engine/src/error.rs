// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds specific to workflow execution.

use cah_core::workflow::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] cah_core::error::CoreError),

    #[error(transparent)]
    Store(#[from] cah_storage::StoreError),

    #[error(transparent)]
    Lock(#[from] cah_storage::LockError),

    #[error(transparent)]
    Queue(#[from] cah_queue::QueueError),

    #[error("node {0} has no registered handler for its type")]
    UnhandledNodeType(NodeId),

    #[error("backend invocation failed: {0}")]
    Backend(#[from] cah_adapters::BackendError),

    #[error("no backend registered and none configured for this task")]
    NoBackendAvailable,

    #[error("planner produced an invalid workflow: {0}")]
    InvalidPlan(String),
}
