// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages injected into a running task from external senders.

use crate::task::TaskId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier for an injected task message.
    pub struct MessageId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    Cli,
    Lark,
    Telegram,
}

/// A message appended by an external sender, consumed by node handlers
/// before the next backend invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: MessageId,
    pub task_id: TaskId,
    pub content: String,
    pub source: MessageSource,
    #[serde(default)]
    pub consumed: bool,
    pub timestamp_ms: u64,
}
