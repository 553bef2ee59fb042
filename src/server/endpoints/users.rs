use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::server::types::{ApiErrorType, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub id: String,
    pub fullname: String,
}

/// POST /register
/// Registers a user; registering an existing ID is a no-op.
pub async fn post_register(
    State(s): State<Arc<AppState>>,
    Json(body): Json<RegisterBody>,
) -> Response {
    info!("POST /register id={}", body.id);

    match s.store.register_user(&body.id, &body.fullname) {
        Ok(registered) => (StatusCode::OK, Json(json!({"registered": registered}))).into_response(),
        Err(e) => ApiErrorType::from((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to register user",
            Some(e.to_string()),
        ))
        .into_response(),
    }
}

/// GET /users/:user_id
/// Existence check for a registered user.
pub async fn get_user(Path(user_id): Path<String>, State(s): State<Arc<AppState>>) -> Response {
    info!("GET /users/{}", user_id);

    match s.store.user_exists(&user_id) {
        Ok(exists) => (StatusCode::OK, Json(json!({"exists": exists}))).into_response(),
        Err(e) => ApiErrorType::from((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to check user",
            Some(e.to_string()),
        ))
        .into_response(),
    }
}
