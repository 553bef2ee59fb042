use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// GET /health
pub async fn get_health() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}
