//! HTTP endpoints: health and poll history, plus router assembly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::types::PollId;
use crate::ws;

/// Response structure for the health check
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_poll: Option<PollId>,
    pub participants: usize,
}

/// Liveness check.
///
/// GET / and GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let active_poll = state.polls.active_snapshot().await.map(|p| p.id);
    Json(HealthResponse {
        status: "ok",
        active_poll,
        participants: state.participants().await.len(),
    })
}

/// Every launched poll with its tally, newest first.
///
/// GET /history
pub async fn history(State(state): State<Arc<AppState>>) -> Response {
    match state.polls.history().await {
        Ok(polls) => Json(polls).into_response(),
        Err(e) => {
            tracing::error!("Failed to load poll history: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("History unavailable: {}", e),
            )
                .into_response()
        }
    }
}

/// All routes with middleware applied
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/history", get(history))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
