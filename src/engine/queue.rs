//! In-memory FIFO of task ids waiting for the worker.
//!
//! Holds identifiers only; the worker re-reads each task from the store
//! after dequeuing. Nothing here survives a restart.

use std::collections::VecDeque;
use std::sync::Mutex;

use opentelemetry::KeyValue;
use tokio::sync::Notify;
use tracing::debug;

use crate::model::TaskId;
use crate::telemetry::metrics;

/// Thread-safe FIFO shared by the API surface and the worker.
#[derive(Default)]
pub struct JobQueue {
    ids: Mutex<VecDeque<TaskId>>,
    ready: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail and wake the worker.
    pub fn enqueue(&self, id: TaskId) {
        let depth = {
            let mut ids = self.lock();
            ids.push_back(id);
            ids.len()
        };
        // Stores a permit if the worker is busy, so the wake-up is not lost.
        self.ready.notify_one();

        metrics::queue_operations().add(1, &[KeyValue::new("operation", "enqueue")]);
        debug!(task_id = %id, depth, "task enqueued");
    }

    /// Remove and return the head, or None if the queue is empty.
    pub fn dequeue(&self) -> Option<TaskId> {
        let id = self.lock().pop_front();
        if id.is_some() {
            metrics::queue_operations().add(1, &[KeyValue::new("operation", "dequeue")]);
        }
        id
    }

    /// Wait until something may have been enqueued.
    ///
    /// Wake-ups can be spurious; callers re-check with [`dequeue`](Self::dequeue).
    pub async fn notified(&self) {
        self.ready.notified().await;
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<TaskId>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn dequeues_in_fifo_order() {
        let queue = JobQueue::new();
        let ids: Vec<TaskId> = (0..3).map(|_| TaskId::new()).collect();
        for id in &ids {
            queue.enqueue(*id);
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue(), Some(ids[0]));
        assert_eq!(queue.dequeue(), Some(ids[1]));
        assert_eq!(queue.dequeue(), Some(ids[2]));
        assert_eq!(queue.dequeue(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn concurrent_enqueues_are_all_kept() {
        let queue = Arc::new(JobQueue::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        queue.enqueue(TaskId::new());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut drained = 0;
        while queue.dequeue().is_some() {
            drained += 1;
        }
        assert_eq!(drained, 800);
    }

    #[tokio::test]
    async fn enqueue_before_wait_is_not_lost() {
        let queue = JobQueue::new();
        queue.enqueue(TaskId::new());

        tokio::time::timeout(Duration::from_secs(1), queue.notified())
            .await
            .expect("permit from earlier enqueue should wake the waiter");
        assert!(queue.dequeue().is_some());
    }
}
