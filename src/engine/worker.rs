//! The worker: a single long-lived loop that drains the job queue.
//!
//! One task at a time: look it up, mark it in progress, wait out the
//! processing delay, filter both sources, then persist the records and the
//! final status in one transaction. A failing task is marked failed and the
//! loop moves on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tokio::sync::Notify;
use tracing::{Instrument, Span, debug, error, info, warn};

use super::JobQueue;
use crate::db::Db;
use crate::error::{Error, Result};
use crate::filter::collect_matching;
use crate::model::{TaskId, TaskStatus};
use crate::source::SourceSet;
use crate::telemetry::metrics;
use crate::telemetry::task::{record_state_transition, start_task_span};

/// Configuration for the worker loop.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Fallback wake-up when no enqueue notification arrives.
    pub poll_interval: Duration,
    /// Simulated processing latency spent in `in_progress`.
    pub processing_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            processing_delay: Duration::from_secs(5),
        }
    }
}

/// What happened to one dequeued task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Records persisted and the task completed.
    Completed { records: usize },
    /// Processing failed; the task was marked failed if it still existed.
    Failed,
    /// The id no longer named a pending task and was skipped.
    Dropped,
}

/// The background worker. Exactly one should run per process; there is no
/// claim or lease mechanism to keep two of them off the same task.
#[derive(Clone)]
pub struct Worker {
    db: Arc<Db>,
    queue: Arc<JobQueue>,
    sources: SourceSet,
    config: WorkerConfig,
    shutdown: Arc<Notify>,
}

impl Worker {
    pub fn new(db: Arc<Db>, queue: Arc<JobQueue>, sources: SourceSet, config: WorkerConfig) -> Self {
        Self {
            db,
            queue,
            sources,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Signal the worker to stop after the task it is currently processing.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            sources = self.sources.len(),
            "worker started"
        );

        loop {
            while let Some(id) = self.queue.dequeue() {
                self.process(id).await;
            }

            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("worker shutting down");
                    return;
                }
                _ = self.queue.notified() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Process one task id end to end. Never returns an error: failures are
    /// logged and recorded on the task.
    pub async fn process(&self, id: TaskId) -> TaskOutcome {
        let span = start_task_span(id);
        let started = Instant::now();

        let outcome = async {
            let mut status = TaskStatus::Pending;
            match self.try_process(id, &span, &mut status).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, status = %status, "task processing failed");
                    self.mark_failed(id, &span, status).await;
                    TaskOutcome::Failed
                }
            }
        }
        .instrument(span.clone())
        .await;

        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "task.process")],
        );
        outcome
    }

    async fn try_process(
        &self,
        id: TaskId,
        span: &Span,
        status: &mut TaskStatus,
    ) -> Result<TaskOutcome> {
        let task = match self.db.get_task(id).await {
            Ok(task) => task,
            Err(Error::NotFound(_)) => {
                debug!("task no longer exists, dropping");
                metrics::queue_operations().add(1, &[KeyValue::new("operation", "drop")]);
                return Ok(TaskOutcome::Dropped);
            }
            Err(e) => return Err(e),
        };
        if task.status != TaskStatus::Pending {
            if task.status.is_terminal() {
                debug!(status = %task.status, "task already finished, dropping");
            } else {
                warn!(status = %task.status, "task is not pending, dropping");
            }
            metrics::queue_operations().add(1, &[KeyValue::new("operation", "drop")]);
            return Ok(TaskOutcome::Dropped);
        }

        // Committed before the delay so pollers can observe it.
        let task = self.db.update_task_status(id, TaskStatus::InProgress).await?;
        record_state_transition(span, *status, TaskStatus::InProgress);
        *status = TaskStatus::InProgress;

        tokio::time::sleep(self.config.processing_delay).await;

        let sources = self.sources.clone();
        let records = tokio::task::spawn_blocking(move || collect_matching(&task, &sources))
            .await
            .map_err(|e| Error::Other(format!("source read aborted: {e}")))?;

        let count = records.len();
        self.db.complete_task(id, &records).await?;
        record_state_transition(span, *status, TaskStatus::Completed);
        *status = TaskStatus::Completed;

        info!(records = count, "task completed");
        Ok(TaskOutcome::Completed { records: count })
    }

    async fn mark_failed(&self, id: TaskId, span: &Span, from: TaskStatus) {
        match self.db.update_task_status(id, TaskStatus::Failed).await {
            Ok(_) => record_state_transition(span, from, TaskStatus::Failed),
            Err(e) => error!(error = %e, "could not mark task failed"),
        }
    }
}
