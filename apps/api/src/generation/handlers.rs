//! Axum route handlers for the Generation API.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::models::{DebugPromptResponse, GeneratePostRequest, GeneratedContent};
use crate::generation::pipeline::ContentPipeline;
use crate::state::AppState;

/// POST /generate-post
///
/// Full pipeline: prompt → text generation → repair → image chain → assembly.
/// Returns all three variants or a single failure; never a partial result.
pub async fn handle_generate_post(
    State(state): State<AppState>,
    payload: Result<Json<GeneratePostRequest>, JsonRejection>,
) -> Result<Json<GeneratedContent>, AppError> {
    let Json(request) = payload?;
    validate_request(&request)?;

    let span = info_span!(
        "generate_post",
        request_id = %Uuid::new_v4(),
        niche = %request.brand_profile.niche
    );

    async move {
        info!(past_posts = request.past_posts.len(), "Generating posts");
        let content = state.pipeline.generate(&request).await?;
        info!(
            image_url = content.image.image_url.as_deref().unwrap_or("none"),
            "Successfully generated posts"
        );
        Ok::<_, AppError>(Json(content))
    }
    .instrument(span)
    .await
}

/// POST /generate-post/debug
///
/// Returns the exact system message and prompt the pipeline would send.
/// No external calls are made.
pub async fn handle_generate_post_debug(
    payload: Result<Json<GeneratePostRequest>, JsonRejection>,
) -> Result<Json<DebugPromptResponse>, AppError> {
    let Json(request) = payload?;
    validate_request(&request)?;

    Ok(Json(ContentPipeline::build_prompts(&request)))
}

fn validate_request(request: &GeneratePostRequest) -> Result<(), AppError> {
    if request.brand_profile.niche.trim().is_empty() {
        return Err(AppError::Validation(
            "brandProfile.niche cannot be empty".to_string(),
        ));
    }
    Ok(())
}
