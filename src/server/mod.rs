pub mod routes;
pub mod ws;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/state", get(routes::get_state))
        .route("/api/decide", post(routes::post_decide))
        .route("/api/assess", post(routes::post_assess))
        .route("/api/strike", get(routes::get_strike))
        .route("/api/counters", get(routes::get_counters))
        .route("/ws", get(ws::ws_handler))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
