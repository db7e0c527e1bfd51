//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the REST directory/export endpoints and the editing
//! websocket under a single Axum router. Browsers are thin renderers: all
//! editing state lives in the websocket task.

pub mod presentations;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// HTTP + websocket routes.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/presentations",
            get(presentations::list_presentations).post(presentations::create_presentation),
        )
        .route("/api/presentations/{id}", get(presentations::get_presentation))
        .route("/api/presentations/{id}/join", post(presentations::join_presentation))
        .route("/api/presentations/{id}/users", get(presentations::list_users))
        .route("/api/presentations/{id}/export.pdf", get(presentations::export_pdf))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
