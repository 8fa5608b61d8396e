//! Job queue and the background worker that drains it.

pub mod queue;
pub mod worker;

pub use queue::JobQueue;
pub use worker::{TaskOutcome, Worker, WorkerConfig};

use tracing::info;

use crate::db::Db;
use crate::error::Result;
use crate::model::{NewTask, Task};

/// Create a task and queue it for the worker.
///
/// The task row is committed before its id is enqueued.
pub async fn submit_task(db: &Db, queue: &JobQueue, new: NewTask) -> Result<Task> {
    let task = db.create_task(new).await?;
    queue.enqueue(task.id);
    info!(
        task_id = %task.id,
        start_year = task.start_year,
        end_year = task.end_year,
        companies = task.companies.as_deref().unwrap_or("*"),
        "task submitted"
    );
    Ok(task)
}
