use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::app::AppState;
use crate::call::Action;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/call/{id}", get(get_call))
        .route("/call/by-channel/{channel_id}", get(get_call_by_channel))
        .route("/call/{id}/execute", post(execute_action))
        .route("/call/{id}/next", post(next_action))
        .route("/call/{id}/force-next", post(force_next_action))
        .route("/call/{id}/timeout", post(action_timeout))
}

fn engine_error(operation: &str, call_id: Uuid, e: anyhow::Error) -> Response {
    warn!(call_id = %call_id, "{} failed: {:?}", operation, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

async fn get_call(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.store.get(id).await {
        Ok(call) => Json(call).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn get_call_by_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Response {
    match state.store.get_by_channel(&channel_id).await {
        Ok(call) => Json(call).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn execute_action(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.engine.execute_current_action(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => engine_error("execute", id, e),
    }
}

async fn next_action(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.engine.advance_to_next_action(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => engine_error("advance", id, e),
    }
}

async fn force_next_action(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.engine.force_advance(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => engine_error("force advance", id, e),
    }
}

async fn action_timeout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<Action>,
) -> Response {
    match state.engine.on_action_timeout(id, action).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => engine_error("action timeout", id, e),
    }
}
