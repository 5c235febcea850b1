// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cah-adapters: the concrete, swappable-at-the-edges pieces the core
//! engine drives but never inspects internally — a `BackendAdapter`
//! (C14) that actually runs an external AI CLI process, a desktop
//! notifier subscribed to the `TaskEventBus`, and cron next-fire
//! computation for `schedule` nodes.

pub mod backend;
pub mod cron;
pub mod notify;
pub mod subprocess;

pub use backend::{BackendAdapter, BackendError, BackendRegistry, BackendRequest, BackendResult, OnDelta};
pub use cron::{next_fire_after, CronError};
pub use notify::{DesktopNotifyAdapter, NoOpNotifyAdapter, NotifyAdapter, NotifyError};
pub use subprocess::SubprocessBackendAdapter;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBackendAdapter, FakeInvocation};
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
