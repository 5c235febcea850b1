// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `WorkflowQueue` (C5): enqueue/dequeue/complete/fail over a single
//! `queue.json`, every mutation serialized through the queue lock.

use cah_core::{Job, JobData, JobId, JobStatus};
use cah_storage::{FileLock, LockError, PathLayout};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("lock busy: {0}")]
    LockBusy(String),
    #[error(transparent)]
    Store(#[from] cah_storage::StoreError),
}

impl From<LockError> for QueueError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Busy(p) => QueueError::LockBusy(p),
            LockError::Io(io) => QueueError::Store(cah_storage::StoreError::Io {
                path: "queue.json.lock".into(),
                source: io,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnqueueOptions {
    pub delay_ms: u64,
    pub priority: i32,
    pub max_attempts: u32,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            priority: 0,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// Requeued with exponential backoff; the job remains `waiting`.
    Requeued { delay_ms: u64, attempt: u32 },
    /// `attempts` reached `max_attempts`; the job was removed.
    Removed,
    /// No such job was active.
    NotFound,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct QueueDoc {
    #[serde(default)]
    jobs: Vec<Job>,
    #[serde(default)]
    updated_at_ms: u64,
}

/// Persistent job queue over `queue.json`. Every operation reads,
/// mutates, and writes the whole document under the queue lock — at
/// the scale this system targets (a few hundred nodes) this is simpler
/// and safer than a log-structured append.
pub struct WorkflowQueue {
    layout: PathLayout,
}

impl WorkflowQueue {
    pub fn new(layout: PathLayout) -> Self {
        Self { layout }
    }

    fn with_doc<T>(&self, f: impl FnOnce(&mut QueueDoc) -> T) -> Result<T, QueueError> {
        let lock_path = self.layout.queue_lock();
        let queue_path = self.layout.queue_json();
        let result = FileLock::with_lock(&lock_path, || -> Result<T, QueueError> {
            let mut doc: QueueDoc = cah_storage::read_json(&queue_path, Some(QueueDoc::default())).unwrap_or_default();
            let out = f(&mut doc);
            cah_storage::write_json(&queue_path, &doc)?;
            Ok(out)
        })?;
        result
    }

    /// Enqueue a job for `(instance, node, attempt)`. Upserts by id: a
    /// second enqueue with the identical triple replaces the first
    /// rather than duplicating it (enqueue idempotence).
    pub fn enqueue(&self, data: JobData, attempt: u32, now_ms: u64, opts: EnqueueOptions) -> Result<Job, QueueError> {
        self.with_doc(|doc| {
            let job = Job::new(
                data,
                attempt,
                opts.priority,
                now_ms + opts.delay_ms,
                now_ms,
                opts.max_attempts,
            );
            doc.jobs.retain(|j| j.id != job.id);
            doc.jobs.push(job.clone());
            doc.updated_at_ms = now_ms;
            job
        })
    }

    pub fn enqueue_batch(
        &self,
        items: Vec<(JobData, u32, EnqueueOptions)>,
        now_ms: u64,
    ) -> Result<Vec<Job>, QueueError> {
        self.with_doc(|doc| {
            let mut created = Vec::with_capacity(items.len());
            for (data, attempt, opts) in items {
                let job = Job::new(
                    data,
                    attempt,
                    opts.priority,
                    now_ms + opts.delay_ms,
                    now_ms,
                    opts.max_attempts,
                );
                doc.jobs.retain(|j| j.id != job.id);
                doc.jobs.push(job.clone());
                created.push(job);
            }
            doc.updated_at_ms = now_ms;
            created
        })
    }

    /// Pick the oldest `waiting` job with `process_at <= now`, optionally
    /// scoped to one instance; descending priority, ascending
    /// `created_at` (fair FIFO within a priority band). Transitions it
    /// to `active` and returns a copy.
    pub fn dequeue(
        &self,
        instance_id: Option<&cah_core::InstanceId>,
        now_ms: u64,
    ) -> Result<Option<Job>, QueueError> {
        self.with_doc(|doc| {
            let idx = doc
                .jobs
                .iter()
                .enumerate()
                .filter(|(_, j)| j.status == JobStatus::Waiting && j.process_at_ms <= now_ms)
                .filter(|(_, j)| instance_id.map_or(true, |iid| &j.data.instance_id == iid))
                .min_by(|(_, a), (_, b)| {
                    b.priority
                        .cmp(&a.priority)
                        .then(a.created_at_ms.cmp(&b.created_at_ms))
                })
                .map(|(i, _)| i);
            idx.map(|i| {
                doc.jobs[i].status = JobStatus::Active;
                doc.jobs[i].clone()
            })
        })
    }

    /// Remove a job entirely — authoritative state lives in the instance.
    pub fn complete(&self, job_id: &JobId) -> Result<bool, QueueError> {
        self.with_doc(|doc| {
            let before = doc.jobs.len();
            doc.jobs.retain(|j| &j.id != job_id);
            doc.jobs.len() != before
        })
    }

    /// `2^attempts * 1000ms` exponential backoff.
    pub fn backoff_delay_ms(attempt: u32) -> u64 {
        2u64.saturating_pow(attempt) * 1000
    }

    pub fn fail(&self, job_id: &JobId, error: String, now_ms: u64) -> Result<FailOutcome, QueueError> {
        self.with_doc(|doc| {
            let Some(job) = doc.jobs.iter_mut().find(|j| &j.id == job_id) else {
                return FailOutcome::NotFound;
            };
            let next_attempt = job.attempt + 1;
            if next_attempt < job.max_attempts {
                let delay = Self::backoff_delay_ms(job.attempt);
                job.attempt = next_attempt;
                job.status = JobStatus::Waiting;
                job.process_at_ms = now_ms + delay;
                job.error = Some(error);
                FailOutcome::Requeued {
                    delay_ms: delay,
                    attempt: next_attempt,
                }
            } else {
                let id = job.id.clone();
                doc.jobs.retain(|j| j.id != id);
                FailOutcome::Removed
            }
        })
    }

    /// Two-phase hold for `human` nodes: the job becomes visible to
    /// external approvers but is not touched by the worker loop.
    pub fn mark_waiting_human(&self, job_id: &JobId) -> Result<bool, QueueError> {
        self.with_doc(|doc| {
            if let Some(job) = doc.jobs.iter_mut().find(|j| &j.id == job_id) {
                job.status = JobStatus::WaitingHuman;
                true
            } else {
                false
            }
        })
    }

    /// Resume a `waiting-human` job: back to `waiting`, eligible for
    /// immediate dequeue.
    pub fn resume(&self, job_id: &JobId, now_ms: u64) -> Result<bool, QueueError> {
        self.with_doc(|doc| {
            if let Some(job) = doc.jobs.iter_mut().find(|j| &j.id == job_id) {
                job.status = JobStatus::Waiting;
                job.process_at_ms = now_ms;
                true
            } else {
                false
            }
        })
    }

    pub fn remove_workflow_jobs(&self, workflow_id: &cah_core::WorkflowId) -> Result<usize, QueueError> {
        self.with_doc(|doc| {
            let before = doc.jobs.len();
            doc.jobs.retain(|j| &j.data.workflow_id != workflow_id);
            before - doc.jobs.len()
        })
    }

    pub fn cleanup_old_jobs(&self, older_than_ms: u64) -> Result<usize, QueueError> {
        self.with_doc(|doc| {
            let before = doc.jobs.len();
            doc.jobs
                .retain(|j| j.status != JobStatus::Completed && j.status != JobStatus::Failed || j.created_at_ms >= older_than_ms);
            before - doc.jobs.len()
        })
    }

    /// Remove and return every job — used on shutdown / test teardown.
    pub fn drain(&self) -> Result<Vec<Job>, QueueError> {
        self.with_doc(|doc| std::mem::take(&mut doc.jobs))
    }

    pub fn jobs_for_instance(&self, instance_id: &cah_core::InstanceId) -> Result<Vec<Job>, QueueError> {
        self.with_doc(|doc| {
            doc.jobs
                .iter()
                .filter(|j| &j.data.instance_id == instance_id)
                .cloned()
                .collect()
        })
    }

    pub fn all_jobs(&self) -> Result<Vec<Job>, QueueError> {
        self.with_doc(|doc| doc.jobs.clone())
    }

    pub fn acquire_with_retry(&self) -> Result<FileLock, LockError> {
        FileLock::acquire_with_retry(&self.layout.queue_lock(), 10, Duration::from_millis(100))
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
