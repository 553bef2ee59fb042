use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::server::types::{ApiErrorType, AppState};

#[derive(Debug, Deserialize)]
pub struct ScheduleParams {
    /// Day offset from today; 0 (the default) is today.
    #[serde(default)]
    pub day: i64,
}

/// GET /schedule/:user_id?day=N
/// Returns the user's lessons for the requested day. An unregistered
/// user gets an empty list.
pub async fn get_schedule(
    Path(user_id): Path<String>,
    Query(params): Query<ScheduleParams>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("GET /schedule/{} day={}", user_id, params.day);

    match s.resolver.resolve(&user_id, params.day).await {
        Ok(lessons) => (StatusCode::OK, Json(lessons)).into_response(),
        Err(e) => ApiErrorType::from((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to resolve schedule",
            Some(e.to_string()),
        ))
        .into_response(),
    }
}
