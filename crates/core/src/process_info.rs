// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process info: one record per task, overwritten by the owning runner.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Running,
    Stopped,
    Crashed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub started_at_ms: u64,
    pub status: ProcessStatus,
    #[serde(default)]
    pub last_heartbeat_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProcessInfo {
    pub fn new_running(pid: u32, started_at_ms: u64) -> Self {
        Self {
            pid,
            started_at_ms,
            status: ProcessStatus::Running,
            last_heartbeat_ms: Some(started_at_ms),
            error: None,
        }
    }
}
