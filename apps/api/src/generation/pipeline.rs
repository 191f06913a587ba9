//! Content pipeline — one end-to-end generation, retried as a whole.
//!
//! Flow per attempt: text generation → parse/repair → schema mapping →
//! image prompt optimization → image provider chain → assembly.
//!
//! Prompts are built once per request (they are deterministic). Image failures never
//! reach this level: the chain always resolves, at worst to the placeholder.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::generation::models::{
    response_schema, DebugPromptResponse, DraftContent, GeneratePostRequest, GeneratedContent,
};
use crate::generation::prompts::{build_prompt, build_system_message};
use crate::generation::repair::{parse_model_output, ParseOutcome};
use crate::generation::retry::{retry_generation, RetryPolicy};
use crate::images::prompt::optimize_image_prompt;
use crate::images::ImageProviderChain;
use crate::llm_client::{LlmError, TextGenerator};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] LlmError),

    #[error("model output could not be parsed even after repair: {reason} (raw: {snippet:?})")]
    UnrepairableOutput { reason: String, snippet: String },

    #[error("model output does not match the response schema: {0}")]
    SchemaMismatch(#[source] serde_json::Error),

    #[error("generation failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<GenerationError>,
    },
}

/// Error classification used for backoff and logging. Never derived from message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ProviderUnavailable,
    QuotaExceeded,
    ProviderRejected,
    UnrepairableOutput,
    SchemaMismatch,
    RetryExhausted,
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::Provider(LlmError::ProviderUnavailable(_)) => {
                ErrorKind::ProviderUnavailable
            }
            GenerationError::Provider(LlmError::QuotaExceeded(_)) => ErrorKind::QuotaExceeded,
            GenerationError::Provider(LlmError::ProviderRejected { .. }) => {
                ErrorKind::ProviderRejected
            }
            GenerationError::UnrepairableOutput { .. } => ErrorKind::UnrepairableOutput,
            GenerationError::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            GenerationError::RetryExhausted { .. } => ErrorKind::RetryExhausted,
        }
    }
}

pub struct ContentPipeline {
    text: Arc<dyn TextGenerator>,
    images: ImageProviderChain,
    policy: RetryPolicy,
    schema: Value,
}

impl ContentPipeline {
    pub fn new(text: Arc<dyn TextGenerator>, images: ImageProviderChain, policy: RetryPolicy) -> Self {
        Self {
            text,
            images,
            policy,
            schema: response_schema(),
        }
    }

    /// The exact strings a generation call would send. No I/O.
    pub fn build_prompts(request: &GeneratePostRequest) -> DebugPromptResponse {
        DebugPromptResponse {
            system_message: build_system_message(&request.brand_profile),
            prompt: build_prompt(&request.brand_profile, &request.past_posts),
        }
    }

    /// Generates all three variants, retrying the whole attempt per the policy.
    pub async fn generate(
        &self,
        request: &GeneratePostRequest,
    ) -> Result<GeneratedContent, GenerationError> {
        let prompts = Self::build_prompts(request);
        let niche = request.brand_profile.niche.as_str();

        retry_generation(&self.policy, |attempt| {
            self.generate_once(attempt, &prompts, niche)
        })
        .await
    }

    async fn generate_once(
        &self,
        attempt: u32,
        prompts: &DebugPromptResponse,
        niche: &str,
    ) -> Result<GeneratedContent, GenerationError> {
        info!(attempt, "Generating text content");
        let raw = self
            .text
            .generate(&prompts.system_message, &prompts.prompt, &self.schema)
            .await?;

        let draft = parse_draft(&raw)?;

        let description = if draft.image.image_prompt.trim().is_empty() {
            &draft.image.caption
        } else {
            &draft.image.image_prompt
        };
        let image_prompt = optimize_image_prompt(description, niche);

        info!(attempt, "Generating image");
        let image = self.images.generate(&image_prompt).await;

        Ok(GeneratedContent::assemble(draft, image.image_url))
    }
}

/// Parses (repairing if needed) and maps the raw payload onto `DraftContent`.
pub fn parse_draft(raw: &str) -> Result<DraftContent, GenerationError> {
    let outcome = parse_model_output(raw);

    if outcome.is_repaired() {
        info!("Model output was malformed and has been repaired");
    }
    if let ParseOutcome::Unrepairable(failure) = &outcome {
        error!(
            reason = %failure.reason,
            snippet = %failure.snippet,
            "Model output could not be repaired"
        );
    }

    let value = outcome
        .into_result()
        .map_err(|failure| GenerationError::UnrepairableOutput {
            reason: failure.reason,
            snippet: failure.snippet,
        })?;

    serde_json::from_value(value).map_err(GenerationError::SchemaMismatch)
}
