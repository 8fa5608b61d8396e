//! Integration tests for the HTTP task API.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use salesq::api::{AppState, router};
use salesq::db::Db;
use salesq::engine::JobQueue;
use salesq::model::{TaskId, TaskStatus};
use serde_json::{Value, json};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    db: Arc<Db>,
    queue: Arc<JobQueue>,
}

async fn test_app() -> TestApp {
    let db = Arc::new(Db::in_memory().await.unwrap());
    let queue = Arc::new(JobQueue::new());
    let app = router(AppState::new(db.clone(), queue.clone()));
    TestApp { app, db, queue }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_pending_task_and_enqueues_it() {
    let t = test_app().await;

    let (status, body) = send(
        &t.app,
        post_json(
            "/api/tasks",
            &json!({"start_year": 2023, "end_year": 2023, "companies": "Honda"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    let id: TaskId = body["task_id"].as_str().unwrap().parse().unwrap();

    let task = t.db.get_task(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.companies.as_deref(), Some("Honda"));
    assert_eq!(t.queue.dequeue(), Some(id));
}

#[tokio::test]
async fn invalid_create_is_rejected_without_side_effects() {
    let t = test_app().await;

    for body in [
        json!({"start_year": 2024, "end_year": 2023}),
        json!({"start_year": "2023", "end_year": 2024}),
        json!({"end_year": 2024}),
        json!({"start_year": 2023, "end_year": 2024, "companies": "Honda;Ford"}),
        json!({"start_year": 2023, "end_year": 2024, "companies": "A".repeat(101)}),
    ] {
        let (status, resp) = send(&t.app, post_json("/api/tasks", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(resp["error"].is_string(), "{body}");
    }

    assert!(t.db.list_tasks().await.unwrap().is_empty());
    assert!(t.queue.is_empty());
}

#[tokio::test]
async fn unparseable_body_is_bad_request() {
    let t = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/tasks")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&t.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_task_reports_current_status() {
    let t = test_app().await;
    let (_, created) = send(
        &t.app,
        post_json("/api/tasks", &json!({"start_year": 2020, "end_year": 2021})),
    )
    .await;
    let id = created["task_id"].as_str().unwrap();

    let (status, body) = send(&t.app, get(&format!("/api/tasks/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_id"], id);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["start_year"], 2020);
    assert_eq!(body["end_year"], 2021);
    assert!(body["companies"].is_null());

    t.db.update_task_status(id.parse().unwrap(), TaskStatus::InProgress)
        .await
        .unwrap();
    let (_, body) = send(&t.app, get(&format!("/api/tasks/{id}"))).await;
    assert_eq!(body["status"], "in_progress");
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let t = test_app().await;
    let id = TaskId::new();

    let (status, _) = send(&t.app, get(&format!("/api/tasks/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.app, get(&format!("/api/tasks/{id}/records"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_task_id_is_bad_request() {
    let t = test_app().await;
    let (status, _) = send(&t.app, get("/api/tasks/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_tasks_is_newest_first() {
    let t = test_app().await;

    let mut ids = Vec::new();
    for year in [2020, 2021, 2022] {
        let (_, body) = send(
            &t.app,
            post_json("/api/tasks", &json!({"start_year": year, "end_year": year})),
        )
        .await;
        ids.push(body["task_id"].as_str().unwrap().to_string());
    }

    let (status, body) = send(&t.app, get("/api/tasks")).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["task_id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, [ids[2].as_str(), ids[1].as_str(), ids[0].as_str()]);
}

#[tokio::test]
async fn records_of_pending_task_are_empty() {
    let t = test_app().await;
    let (_, created) = send(
        &t.app,
        post_json("/api/tasks", &json!({"start_year": 2020, "end_year": 2021})),
    )
    .await;
    let id = created["task_id"].as_str().unwrap();

    let (status, body) = send(&t.app, get(&format!("/api/tasks/{id}/records"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

// ---------------------------------------------------------------------------
// Auth and health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn api_key_is_enforced_when_configured() {
    let db = Arc::new(Db::in_memory().await.unwrap());
    let queue = Arc::new(JobQueue::new());
    let app = router(
        AppState::new(db, queue).with_api_key(secrecy::SecretString::from("s3cret".to_string())),
    );

    let (status, body) = send(&app, get("/api/tasks")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let wrong = Request::builder()
        .uri("/api/tasks")
        .header("x-api-key", "nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, wrong).await.0, StatusCode::UNAUTHORIZED);

    let right = Request::builder()
        .uri("/api/tasks")
        .header("x-api-key", "s3cret")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, right).await.0, StatusCode::OK);

    // Health stays open.
    assert_eq!(send(&app, get("/health")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_ok() {
    let t = test_app().await;
    let (status, body) = send(&t.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
