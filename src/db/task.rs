//! Task operations: create, lookup, listing, guarded state transitions.

use chrono::{SubsecRound, Utc};
use opentelemetry::KeyValue;
use sqlx::SqliteConnection;

use super::{Db, TxContext, format_timestamp, parse_timestamp};
use crate::error::{Error, Result};
use crate::model::{NewTask, Task, TaskId, TaskStatus};
use crate::telemetry::metrics;

impl Db {
    /// Persist a new task in `pending`.
    ///
    /// The insert is committed before this returns, so the caller can
    /// enqueue the id right away without the worker racing ahead of it.
    pub async fn create_task(&self, new: NewTask) -> Result<Task> {
        let task = Task {
            id: TaskId::new(),
            status: TaskStatus::Pending,
            start_year: new.start_year,
            end_year: new.end_year,
            companies: new.companies,
            // Stored with microsecond precision; match it so reads compare equal.
            created_at: Utc::now().trunc_subsecs(6),
        };
        let created_at = format_timestamp(task.created_at);

        sqlx::query(
            "INSERT INTO tasks (id, status, start_year, end_year, companies, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        )
        .bind(task.id.to_string())
        .bind(task.status.as_str())
        .bind(task.start_year)
        .bind(task.end_year)
        .bind(task.companies.as_deref())
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        metrics::tasks_submitted().add(
            1,
            &[KeyValue::new(
                "filtered",
                if task.companies.is_some() { "companies" } else { "none" },
            )],
        );

        Ok(task)
    }

    /// Get a task by ID.
    pub async fn get_task(&self, id: TaskId) -> Result<Task> {
        let mut conn = self.pool.acquire().await?;
        get_task_on(&mut conn, id).await
    }

    /// All tasks, newest first.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT id, status, start_year, end_year, companies, created_at
             FROM tasks ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskRow::try_into_task).collect()
    }

    /// Tasks currently in `status`, oldest first.
    pub async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT id, status, start_year, end_year, companies, created_at
             FROM tasks WHERE status = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskRow::try_into_task).collect()
    }

    /// Move a task to `to` in its own transaction.
    ///
    /// Only legal transitions apply; anything else fails with
    /// [`Error::InvalidTransition`] and leaves the task untouched.
    pub async fn update_task_status(&self, id: TaskId, to: TaskStatus) -> Result<Task> {
        let mut tx = self.begin().await?;
        let from = tx.update_status(id, to).await?;
        let task = tx.get_task(id).await?;
        tx.commit().await?;

        record_transition(from, to);
        Ok(task)
    }
}

impl TxContext {
    pub async fn get_task(&mut self, id: TaskId) -> Result<Task> {
        get_task_on(self.conn(), id).await
    }

    /// Apply a guarded status change and return the status it replaced.
    ///
    /// The guarded UPDATE runs first so the transaction takes the write
    /// lock before it reads anything.
    pub async fn update_status(&mut self, id: TaskId, to: TaskStatus) -> Result<TaskStatus> {
        let now = format_timestamp(Utc::now());

        for &from in to.predecessors() {
            let rows_affected = sqlx::query(
                "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            )
            .bind(to.as_str())
            .bind(&now)
            .bind(id.to_string())
            .bind(from.as_str())
            .execute(&mut *self.conn())
            .await?
            .rows_affected();

            if rows_affected == 1 {
                return Ok(from);
            }
        }

        let current = get_task_on(self.conn(), id).await?.status;
        Err(Error::InvalidTransition { from: current, to })
    }
}

pub(crate) fn record_transition(from: TaskStatus, to: TaskStatus) {
    metrics::task_state_transitions().add(
        1,
        &[
            KeyValue::new("from", from.as_str()),
            KeyValue::new("to", to.as_str()),
        ],
    );
}

pub(super) async fn get_task_on(conn: &mut SqliteConnection, id: TaskId) -> Result<Task> {
    let row: Option<TaskRow> = sqlx::query_as(
        "SELECT id, status, start_year, end_year, companies, created_at
         FROM tasks WHERE id = ?1",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or_else(|| Error::NotFound(format!("task {id}")))?
        .try_into_task()
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    status: String,
    start_year: i32,
    end_year: i32,
    companies: Option<String>,
    created_at: String,
}

impl TaskRow {
    fn try_into_task(self) -> Result<Task> {
        Ok(Task {
            id: self.id.parse()?,
            status: self.status.parse()?,
            start_year: self.start_year,
            end_year: self.end_year,
            companies: self.companies,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
