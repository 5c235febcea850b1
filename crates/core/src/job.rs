// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job: a unit queued for the node worker pool.

use crate::instance::InstanceId;
use crate::workflow::{NodeId, WorkflowId};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier for a queued job: `{instance_id}:{node_id}:{attempt}`.
    pub struct JobId;
}

impl JobId {
    pub fn for_attempt(instance_id: &InstanceId, node_id: &NodeId, attempt: u32) -> Self {
        Self::new(format!("{instance_id}:{node_id}:{attempt}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Waiting,
    Active,
    WaitingHuman,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobData {
    pub workflow_id: WorkflowId,
    pub instance_id: InstanceId,
    pub node_id: NodeId,
}

/// A unit of work queued for the node worker pool. Retries reuse the
/// same logical `(instance, node)` pair with an incremented attempt
/// counter baked into the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub data: JobData,
    pub status: JobStatus,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub process_at_ms: u64,
    #[serde(default = "Job::default_max_attempts")]
    pub max_attempts: u32,
    pub attempt: u32,
    pub created_at_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl Job {
    fn default_max_attempts() -> u32 {
        3
    }

    pub fn new(
        data: JobData,
        attempt: u32,
        priority: i32,
        process_at_ms: u64,
        created_at_ms: u64,
        max_attempts: u32,
    ) -> Self {
        let id = JobId::for_attempt(&data.instance_id, &data.node_id, attempt);
        Self {
            id,
            name: format!("node:{}", data.node_id),
            data,
            status: JobStatus::Waiting,
            priority,
            process_at_ms,
            max_attempts,
            attempt,
            created_at_ms,
            error: None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
