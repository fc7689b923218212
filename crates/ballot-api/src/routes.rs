use axum::{
    Json, Router,
    http::{Method, Uri},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::LatencyUnit;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::{self, AppState};
use crate::error::{ApiError, panic_response};
use crate::{polls, tasks, users};

/// Build the full HTTP surface. CORS is left to the caller since allowed
/// origins are deployment configuration.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/guest", post(auth::create_guest))
        .route("/auth/convert-guest", post(auth::convert_guest))
        .route("/auth/me", get(auth::me))
        // Polls
        .route("/polls", get(polls::list_polls).post(polls::create_poll))
        .route(
            "/polls/{id}",
            get(polls::get_poll)
                .put(polls::update_poll)
                .delete(polls::delete_poll),
        )
        .route("/polls/{id}/vote", post(polls::vote))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Tasks
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            TraceLayer::new_for_http().on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Millis),
            ),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "message": "Server is healthy",
        "timestamp": chrono::Utc::now(),
    }))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route {} not found", uri.path()))
}

async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::MethodNotAllowed(format!("Method {} not allowed on {}", method, uri.path()))
}
