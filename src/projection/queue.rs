//! Coalescing projection queue
//!
//! Ordered, at-least-once queue keyed by teacher id. A teacher has at most
//! one pending job: enqueueing again while a job is pending updates its
//! change kind and keeps its position. Enqueue is synchronous so the engine
//! can call it from inside a blocking operation.

use crate::error::ApiError;
use crate::projection::{ChangeKind, ProjectionJob};
use crate::types::TeacherId;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Jobs waiting to be picked up
    pub pending: usize,
    /// Jobs currently being projected
    pub processing: usize,
    pub completed: usize,
    /// Jobs dropped after exhausting their retries
    pub failed: usize,
    /// Enqueues folded into an already pending job
    pub coalesced: usize,
    pub retried: usize,
}

/// How an enqueue was absorbed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    Coalesced,
}

#[derive(Default)]
struct PendingJobs {
    order: VecDeque<TeacherId>,
    jobs: HashMap<TeacherId, ProjectionJob>,
    /// Jobs handed to the consumer and not yet completed or requeued
    in_flight: usize,
}

impl PendingJobs {
    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Projection work queue shared by the engine (producer) and the projector (consumer)
pub struct ProjectionQueue {
    pending: Mutex<PendingJobs>,
    notify: Notify,
    stats: RwLock<QueueStats>,
    max_queue_size: usize,
}

impl ProjectionQueue {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            pending: Mutex::new(PendingJobs::default()),
            notify: Notify::new(),
            stats: RwLock::new(QueueStats::default()),
            max_queue_size,
        }
    }

    /// Enqueue a rebuild for `teacher_id`
    ///
    /// Fails only when the queue is full and the teacher has no pending job.
    pub fn enqueue(&self, teacher_id: &str, change: ChangeKind) -> Result<EnqueueOutcome, ApiError> {
        let mut pending = self.pending.lock();

        if let Some(existing) = pending.jobs.get_mut(teacher_id) {
            existing.change = change;
            drop(pending);
            self.stats.write().coalesced += 1;
            debug!(teacher_id, change = %change, "Coalesced projection job");
            return Ok(EnqueueOutcome::Coalesced);
        }

        if pending.len() >= self.max_queue_size {
            warn!(
                queue_size = pending.len(),
                max_size = self.max_queue_size,
                teacher_id,
                "Projection queue is full, dropping job"
            );
            return Err(ApiError::ProjectionError(
                "Projection queue is full".to_string(),
            ));
        }

        pending.order.push_back(teacher_id.to_string());
        pending
            .jobs
            .insert(teacher_id.to_string(), ProjectionJob::new(teacher_id, change));
        let queue_size = pending.len();
        drop(pending);

        self.stats.write().pending += 1;
        self.notify.notify_one();
        debug!(teacher_id, change = %change, queue_size, "Enqueued projection job");
        Ok(EnqueueOutcome::Queued)
    }

    /// Take the oldest pending job and mark it as processing
    pub fn next_job(&self) -> Option<ProjectionJob> {
        let mut pending = self.pending.lock();
        while let Some(teacher_id) = pending.order.pop_front() {
            if let Some(job) = pending.jobs.remove(&teacher_id) {
                pending.in_flight += 1;
                drop(pending);
                let mut stats = self.stats.write();
                stats.pending = stats.pending.saturating_sub(1);
                stats.processing += 1;
                return Some(job);
            }
        }
        None
    }

    /// Record a finished job
    pub fn complete(&self, succeeded: bool) {
        {
            let mut pending = self.pending.lock();
            pending.in_flight = pending.in_flight.saturating_sub(1);
        }
        let mut stats = self.stats.write();
        stats.processing = stats.processing.saturating_sub(1);
        if succeeded {
            stats.completed += 1;
        } else {
            stats.failed += 1;
        }
    }

    /// Put a failed job back at the front of the queue
    ///
    /// A job enqueued for the same teacher in the meantime already covers the
    /// retry, so the retry is folded into it.
    pub fn requeue(&self, mut job: ProjectionJob) {
        let mut pending = self.pending.lock();
        pending.in_flight = pending.in_flight.saturating_sub(1);
        let folded = pending.jobs.contains_key(&job.teacher_id);
        if !folded {
            job.retry_count += 1;
            pending.order.push_front(job.teacher_id.clone());
            pending.jobs.insert(job.teacher_id.clone(), job);
        }
        drop(pending);

        {
            let mut stats = self.stats.write();
            stats.processing = stats.processing.saturating_sub(1);
            stats.retried += 1;
            if folded {
                stats.coalesced += 1;
            } else {
                stats.pending += 1;
            }
        }
        self.notify.notify_one();
    }

    /// Wait until a job may be available or `timeout` elapses
    pub async fn wait_for_work(&self, timeout: Duration) {
        tokio::select! {
            _ = self.notify.notified() => {}
            _ = sleep(timeout) => {}
        }
    }

    /// Wake a waiting consumer (used on shutdown)
    pub fn wake(&self) {
        self.notify.notify_waiters();
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.read().clone()
    }

    pub fn is_idle(&self) -> bool {
        let pending = self.pending.lock();
        pending.len() == 0 && pending.in_flight == 0
    }

    /// Change kind of the pending job for `teacher_id`, if any
    pub fn pending_change(&self, teacher_id: &str) -> Option<ChangeKind> {
        self.pending.lock().jobs.get(teacher_id).map(|j| j.change)
    }

    /// Pending teacher ids in processing order
    pub fn pending_teachers(&self) -> Vec<TeacherId> {
        self.pending.lock().order.iter().cloned().collect()
    }

    /// Wait for the queue to drain (nothing pending, nothing processing)
    pub async fn wait_for_idle(&self, timeout: Option<Duration>) -> Result<(), ApiError> {
        let start = Instant::now();
        loop {
            if self.is_idle() {
                return Ok(());
            }
            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    return Err(ApiError::ProjectionError(
                        "Timeout waiting for projection queue to drain".to_string(),
                    ));
                }
            }
            sleep(Duration::from_millis(10)).await;
        }
    }
}
