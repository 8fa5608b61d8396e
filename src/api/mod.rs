//! HTTP surface: task creation, status reads, and record listing.
//!
//! Thin adapter over the store and the job queue. Routes live under
//! `/api`; `/health` sits outside it and is never key-protected.

pub mod auth;
pub mod error;
pub mod tasks;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router, middleware};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::Db;
use crate::engine::JobQueue;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub queue: Arc<JobQueue>,
    /// When set, every `/api` request must carry it in `X-API-Key`.
    pub api_key: Option<Arc<SecretString>>,
}

impl AppState {
    pub fn new(db: Arc<Db>, queue: Arc<JobQueue>) -> Self {
        Self {
            db,
            queue,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(Arc::new(key));
        self
    }
}

/// Build the application router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/:task_id", get(tasks::get_task))
        .route("/tasks/:task_id/records", get(tasks::list_records))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.db.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}
