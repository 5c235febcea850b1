// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C13: the in-process event bus every lifecycle event flows through.
//! Subscribers (the timeline writer, the desktop notifier, the CLI's
//! `follow` mode) each get their own broadcast receiver and can fall
//! behind or drop off without affecting the engine.

use cah_core::clock::Clock;
use cah_core::event::{Event, TimelineEntry};
use cah_core::instance::InstanceId;
use cah_core::task::TaskId;
use cah_storage::TaskStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct TaskEventBus {
    sender: broadcast::Sender<Event>,
    /// Maps a running instance back to the task that owns it, so that
    /// node-scoped events (which only carry an `InstanceId`) can still
    /// be attributed to a task for per-task consumers like the
    /// timeline writer.
    instance_index: Arc<Mutex<HashMap<InstanceId, TaskId>>>,
}

impl Default for TaskEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TaskEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            instance_index: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: Event) {
        if let Event::WorkflowStarted { task_id, instance_id, .. } = &event {
            self.instance_index.lock().insert(instance_id.clone(), task_id.clone());
        }
        // A lagging or absent subscriber is not an error: the engine
        // does not depend on anyone having received an event.
        let _ = self.sender.send(event);
    }

    pub fn task_for_instance(&self, instance_id: &InstanceId) -> Option<TaskId> {
        self.instance_index.lock().get(instance_id).cloned()
    }

    fn resolve_task_id(&self, event: &Event) -> Option<TaskId> {
        if let Some(id) = event.task_id() {
            return Some(id.clone());
        }
        match event {
            Event::NodeStarted { instance_id, .. }
            | Event::NodeCompleted { instance_id, .. }
            | Event::NodeFailed { instance_id, .. }
            | Event::NodeWaiting { instance_id, .. } => self.task_for_instance(instance_id),
            _ => None,
        }
    }
}

/// Drains `bus` forever, appending one [`TimelineEntry`] per event to
/// the owning task's `timeline.json`. Intended to run as its own
/// background task for the lifetime of the daemon.
pub async fn run_timeline_writer(bus: TaskEventBus, store: Arc<TaskStore>, clock: Arc<dyn Clock>) {
    let mut rx = bus.subscribe();
    loop {
        match rx.recv().await {
            Ok(event) => {
                let Some(task_id) = bus.resolve_task_id(&event) else {
                    continue;
                };
                let entry = TimelineEntry {
                    timestamp_ms: clock.now_ms(),
                    event: event.name().to_string(),
                    details: serde_json::to_value(&event).ok(),
                };
                if let Err(err) = store.append_timeline(&task_id, entry) {
                    tracing::warn!(task_id = %task_id, error = %err, "failed to append timeline entry");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "timeline writer lagged behind the event bus");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
