use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::server::endpoints::{schedule, status, users};

mod endpoints;
mod types;

pub use types::AppState;

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(status::get_health))
        .route("/schedule/:user_id", get(schedule::get_schedule))
        .route("/register", post(users::post_register))
        .route("/users/:user_id", get(users::get_user))
        .with_state(app_state)
}
