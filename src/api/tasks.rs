//! Task routes.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{ApiError, AppState};
use crate::engine::submit_task;
use crate::error::{Error, Result};
use crate::model::{NewTask, SalesRecord, Task, TaskId, TaskStatus};

/// Response to a successful create.
#[derive(Debug, Serialize)]
pub struct CreatedTask {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// Wire shape of a task.
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub start_year: i32,
    pub end_year: i32,
    pub companies: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.id,
            status: task.status,
            start_year: task.start_year,
            end_year: task.end_year,
            companies: task.companies,
            created_at: task.created_at,
        }
    }
}

/// Wire shape of a sales record.
#[derive(Debug, Serialize)]
pub struct RecordView {
    pub id: i64,
    pub company: String,
    pub car_model: String,
    pub sale_date: NaiveDate,
    pub price: f64,
}

impl From<SalesRecord> for RecordView {
    fn from(record: SalesRecord) -> Self {
        Self {
            id: record.id,
            company: record.company,
            car_model: record.car_model,
            sale_date: record.sale_date,
            price: record.price,
        }
    }
}

/// POST /api/tasks
///
/// Body: `{"start_year": 2023, "end_year": 2024, "companies": "Honda,Toyota"}`
pub async fn create_task(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<CreatedTask>), ApiError> {
    let Json(body) = body.map_err(|e| Error::Validation(e.body_text()))?;
    let new = parse_new_task(&body)?;
    let task = submit_task(&state.db, &state.queue, new).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedTask {
            task_id: task.id,
            status: task.status,
        }),
    ))
}

/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
) -> std::result::Result<Json<Vec<TaskView>>, ApiError> {
    let tasks = state.db.list_tasks().await?;
    Ok(Json(tasks.into_iter().map(TaskView::from).collect()))
}

/// GET /api/tasks/:task_id
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> std::result::Result<Json<TaskView>, ApiError> {
    let task = state.db.get_task(task_id.parse()?).await?;
    Ok(Json(task.into()))
}

/// GET /api/tasks/:task_id/records
pub async fn list_records(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> std::result::Result<Json<Vec<RecordView>>, ApiError> {
    let records = state.db.list_records(task_id.parse()?).await?;
    Ok(Json(records.into_iter().map(RecordView::from).collect()))
}

/// Validate a create-task body into a [`NewTask`].
pub fn parse_new_task(body: &Value) -> Result<NewTask> {
    if !body.is_object() {
        return Err(Error::Validation(
            "request body must be a JSON object".to_string(),
        ));
    }

    let start_year = year_field(body, "start_year")?;
    let end_year = year_field(body, "end_year")?;
    let companies = match body.get("companies") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(Error::Validation(
                "companies must be a comma-separated string".to_string(),
            ));
        }
    };

    NewTask::new(start_year, end_year, companies)
}

fn year_field(body: &Value, name: &str) -> Result<i32> {
    match body.get(name) {
        None | Some(Value::Null) => Err(Error::Validation(format!("{name} is required"))),
        Some(value) => value
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| Error::Validation(format!("{name} must be an integer"))),
    }
}
