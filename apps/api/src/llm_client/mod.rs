//! LLM Client — the single point of entry for all text-generation calls.
//!
//! ARCHITECTURAL RULE: No other module may call the Gemini API directly.
//! Provider failures are classified here into `LlmError` and never escape as raw
//! transport errors.
//!
//! Exactly one HTTP attempt per call. Retries belong to the generation pipeline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

use prompts::{ALL_KEYS_INSTRUCTION, JSON_ONLY_SUFFIX};

/// The model used for all text-generation calls.
/// Hardcoded so the response schema and the model never drift apart.
pub const MODEL: &str = "gemini-2.5-flash";
const TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 0.95;
const MAX_OUTPUT_TOKENS: u32 = 8192;
/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Network failure, timeout, or a 5xx from the provider.
    #[error("text provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// HTTP 429 or an explicit quota / rate-limit error body.
    #[error("text provider quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other non-2xx response, or a 2xx body that is not a generation envelope.
    #[error("text provider rejected the request (status {status}): {message}")]
    ProviderRejected { status: u16, message: String },
}

/// Schema-constrained text generation. One call, one attempt.
///
/// Carried by the pipeline as `Arc<dyn TextGenerator>` so tests can substitute fakes.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the raw textual payload produced by the provider.
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    response_mime_type: &'a str,
    response_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenates the text parts of the first candidate. Empty when the provider
    /// returned no usable text.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{MODEL}:generateContent", self.base_url)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<String, LlmError> {
        let system_instruction = format!("{system} {ALL_KEYS_INSTRUCTION}");
        let full_prompt = format!("{system}\n\n{prompt}\n\n{JSON_ONLY_SUFFIX}");

        let request_body = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &system_instruction,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &full_prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_p: TOP_P,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: "application/json",
                response_schema: schema,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", &self.api_key)])
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_failure(status, &body);
            warn!(status = status.as_u16(), error = %err, "Text provider call failed");
            return Err(err);
        }

        let envelope: GenerateContentResponse =
            response.json().await.map_err(|e| LlmError::ProviderRejected {
                status: status.as_u16(),
                message: format!("unreadable response envelope: {e}"),
            })?;

        let text = envelope.text();
        debug!(chars = text.chars().count(), "Text provider call succeeded");
        Ok(text)
    }
}

/// Maps a non-2xx response to its error kind. Quota is signalled by 429 or by a
/// `RESOURCE_EXHAUSTED` status in the error body, whatever the HTTP code.
fn classify_failure(status: StatusCode, body: &str) -> LlmError {
    let parsed = serde_json::from_str::<GoogleError>(body).ok();
    let quota_status = parsed
        .as_ref()
        .is_some_and(|e| e.error.status == "RESOURCE_EXHAUSTED");
    let message = parsed
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY).collect());

    if status == StatusCode::TOO_MANY_REQUESTS || quota_status {
        LlmError::QuotaExceeded(message)
    } else if status.is_server_error() {
        LlmError::ProviderUnavailable(format!("status {}: {message}", status.as_u16()))
    } else {
        LlmError::ProviderRejected {
            status: status.as_u16(),
            message,
        }
    }
}
