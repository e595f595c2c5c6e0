mod error;
mod state;

pub mod routes;

pub use error::ApiError;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config().http.body_limit_mb * 1024 * 1024;

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/models", get(routes::models::list_models))
        .route("/api/chat", post(routes::chat::chat_completion))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}
