pub mod health;
pub mod quiz;
pub mod workspace;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::cors::cors_layer;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.cors_origin.as_deref());
    let body_limit = state.max_upload_bytes;

    let workspace_api = Router::new()
        .route("/api/workspaces", post(workspace::create_workspace))
        .route(
            "/api/workspaces/:id",
            get(workspace::get_workspace).delete(workspace::delete_workspace),
        )
        .route(
            "/api/workspaces/:id/preferences",
            patch(workspace::update_preferences),
        )
        .route(
            "/api/workspaces/:id/documents",
            post(workspace::upload_document),
        )
        .route(
            "/api/workspaces/:id/prompt",
            post(workspace::generate_from_prompt),
        )
        .route("/api/workspaces/:id/quiz/select", post(workspace::select_option))
        .route("/api/workspaces/:id/quiz/check", post(workspace::check_answer))
        .route("/api/workspaces/:id/quiz/next", post(workspace::next_question))
        .route("/api/workspaces/:id/restart", post(workspace::restart));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/quiz/options", get(quiz::get_quiz_options))
        .merge(workspace_api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}
