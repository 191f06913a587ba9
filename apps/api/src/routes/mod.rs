pub mod health;

use std::path::Path;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::generation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState, images_dir: &Path) -> Router {
    Router::new()
        .route("/", get(health::health_handler))
        .route("/health", get(health::health_handler))
        .route("/generate-post", post(handlers::handle_generate_post))
        .route(
            "/generate-post/debug",
            post(handlers::handle_generate_post_debug),
        )
        // Locally stored images and the placeholder
        .nest_service("/images", ServeDir::new(images_dir))
        .with_state(state)
}
