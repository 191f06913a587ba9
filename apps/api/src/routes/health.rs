use axum::Json;

use crate::generation::models::HealthResponse;

/// GET / and GET /health
/// Returns a fixed status/service/version triple.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "AI Content Generator",
        version: env!("CARGO_PKG_VERSION"),
    })
}
