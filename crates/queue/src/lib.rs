// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cah-queue: the persistent job queue (C5) — a single JSON document
//! guarded by the queue lock, holding every `waiting`/`active`/
//! `waiting-human` job across all in-flight workflow instances.

pub mod queue;

pub use queue::{EnqueueOptions, FailOutcome, QueueError, WorkflowQueue};
