// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NodeWorker (C8): a process-local pool that dequeues jobs and runs
//! them truly concurrently up to `concurrency`. The pool itself never
//! decides whether a job should retry, complete, or wait on a human —
//! that is a workflow-aware decision (retry policy, `on_error`) the
//! [`JobProcessor`] makes and reports back via the queue directly.

use async_trait::async_trait;
use cah_core::clock::Clock;
use cah_core::job::Job;
use cah_queue::WorkflowQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Executes one dequeued job to completion, including telling the
/// queue (and the instance) what happened. Implemented by
/// [`crate::executor::TaskExecutor`].
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: Job);
}

#[derive(Debug, Clone, Copy)]
pub struct NodeWorkerConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
}

impl Default for NodeWorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            poll_interval: Duration::from_millis(200),
        }
    }
}

/// `{concurrency, pollInterval, processor, instanceId?}` from the data
/// model, realized as a tokio task per in-flight job bounded by a
/// semaphore.
pub struct NodeWorker<P: JobProcessor + 'static> {
    queue: Arc<WorkflowQueue>,
    processor: Arc<P>,
    instance_id: Option<cah_core::InstanceId>,
    config: NodeWorkerConfig,
    running: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

impl<P: JobProcessor + 'static> NodeWorker<P> {
    pub fn new(
        queue: Arc<WorkflowQueue>,
        processor: Arc<P>,
        instance_id: Option<cah_core::InstanceId>,
        config: NodeWorkerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue,
            processor,
            instance_id,
            config,
            running: Arc::new(AtomicBool::new(false)),
            clock,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the dequeue loop until [`NodeWorker::stop`] is called.
    pub async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut in_flight: Vec<tokio::task::JoinHandle<()>> = Vec::new();

        while self.running.load(Ordering::SeqCst) {
            in_flight.retain(|h| !h.is_finished());

            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                tokio::time::sleep(self.config.poll_interval).await;
                continue;
            };

            let now_ms = self.clock.now_ms();
            match self.queue.dequeue(self.instance_id.as_ref(), now_ms) {
                Ok(Some(job)) => {
                    let processor = self.processor.clone();
                    let handle = tokio::spawn(async move {
                        let _permit = permit;
                        processor.process(job).await;
                    });
                    in_flight.push(handle);
                }
                Ok(None) => {
                    drop(permit);
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(err) => {
                    drop(permit);
                    tracing::warn!(error = %err, "queue dequeue failed, backing off");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }

        // Drain: wait for whatever is in flight before returning control
        // to the caller, so `close()` never races a partially-applied
        // node result.
        for handle in in_flight {
            let _ = handle.await;
        }
    }

    /// Signal the loop to stop after its current dequeue attempt. Does
    /// not itself await in-flight drain — call `start()` to completion
    /// (it returns once `running` is false and in-flight jobs finish).
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
