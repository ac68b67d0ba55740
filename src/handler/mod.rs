use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::app::AppState;

mod call;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(call::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}
