//! Shared state and error body for the HTTP API.

use crate::resolver::ScheduleResolver;
use crate::store::ScheduleStore;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;

/// State shared by every endpoint.
pub struct AppState {
    pub store: Arc<ScheduleStore>,
    pub resolver: ScheduleResolver,
}

impl AppState {
    pub fn new(store: Arc<ScheduleStore>) -> Self {
        Self {
            resolver: ScheduleResolver::new(store.clone()),
            store,
        }
    }
}

/// JSON error body returned by failing endpoints.
pub struct ApiErrorType {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl From<(StatusCode, &str, Option<String>)> for ApiErrorType {
    fn from((status, message, detail): (StatusCode, &str, Option<String>)) -> Self {
        Self {
            status,
            message: message.to_string(),
            detail,
        }
    }
}

impl IntoResponse for ApiErrorType {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.message,
                "detail": self.detail,
            })),
        )
            .into_response()
    }
}
