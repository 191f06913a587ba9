use std::sync::Arc;

use crate::generation::pipeline::ContentPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Fully wired generation pipeline. Providers and stores are built once in `main`.
    pub pipeline: Arc<ContentPipeline>,
}
