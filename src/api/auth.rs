//! Static API key check.

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use secrecy::ExposeSecret;
use serde_json::json;

use super::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests whose `X-API-Key` does not match the configured key.
/// Passes everything through when no key is configured.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(ref expected) = state.api_key else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided == Some(expected.expose_secret()) {
        next.run(request).await
    } else {
        tracing::warn!(path = %request.uri().path(), "rejected request without valid API key");
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "missing or invalid API key" })),
        )
            .into_response()
    }
}
