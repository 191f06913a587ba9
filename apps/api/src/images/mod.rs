//! Image generation — an ordered chain of providers ending in a placeholder that
//! cannot fail.
//!
//! ARCHITECTURAL RULE: provider failures are logged and absorbed here. Nothing
//! outside this module ever sees an `ImageError`; callers get a `ProviderResult`.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{info, warn};

pub mod placeholder;
pub mod pollinations;
pub mod prompt;
pub mod stability;
pub mod store;

use placeholder::PlaceholderImage;

/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider returned status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// A 2xx whose body is not an image, e.g. an HTML error page.
    #[error("provider returned non-image content ({content_type})")]
    NotAnImage { content_type: String },

    #[error("image store error: {0}")]
    Store(String),
}

/// What every provider receives. The seed is drawn once per chain run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub seed: u32,
}

/// Resolved image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResult {
    /// Remote URL or a `{BASE_URL}/images/<file>` reference. Always set.
    pub image_url: String,
    pub local_path: Option<PathBuf>,
    /// Diagnostic for degraded results (placeholder after provider failures).
    pub error: Option<String>,
}

/// A single image generation strategy.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, request: &ImageRequest) -> Result<ProviderResult, ImageError>;
}

/// Ordered provider chain. Providers are tried in order; the first success wins and
/// the placeholder is returned when all of them fail. Results are never combined.
pub struct ImageProviderChain {
    providers: Vec<Box<dyn ImageProvider>>,
    placeholder: PlaceholderImage,
}

impl ImageProviderChain {
    pub fn new(providers: Vec<Box<dyn ImageProvider>>, placeholder: PlaceholderImage) -> Self {
        Self {
            providers,
            placeholder,
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Runs the chain for an already optimized prompt. Never fails.
    pub async fn generate(&self, prompt: &str) -> ProviderResult {
        let request = ImageRequest {
            prompt: prompt.to_string(),
            // Kept below i32::MAX so every provider accepts it.
            seed: rand::random::<u32>() >> 1,
        };

        let mut failures = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match provider.attempt(&request).await {
                Ok(result) => {
                    info!(
                        provider = provider.name(),
                        url = %result.image_url,
                        local_path = ?result.local_path,
                        "Image generated"
                    );
                    return result;
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Image provider failed, trying next");
                    failures.push(format!("{}: {e}", provider.name()));
                }
            }
        }

        let mut result = self.placeholder.resolve().await;
        let summary = if failures.is_empty() {
            "no image provider configured".to_string()
        } else {
            format!("all image providers failed ({})", failures.join("; "))
        };
        result.error = Some(match result.error.take() {
            Some(placeholder_error) => format!("{summary}; {placeholder_error}"),
            None => summary,
        });
        warn!(url = %result.image_url, "Falling back to placeholder image");
        result
    }
}

/// Accepts a response only if it is 2xx AND declares an `image/*` content type.
/// Returns the body and its content type.
pub(crate) async fn read_image_body(
    response: reqwest::Response,
) -> Result<(Bytes, String), ImageError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ImageError::Rejected {
            status: status.as_u16(),
            message: body.chars().take(MAX_ERROR_BODY).collect(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if !content_type.starts_with("image/") {
        return Err(ImageError::NotAnImage {
            content_type: if content_type.is_empty() {
                "missing".to_string()
            } else {
                content_type
            },
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ImageError::Unavailable(format!("failed to read image body: {e}")))?;

    if bytes.is_empty() {
        return Err(ImageError::Unavailable("empty image body".to_string()));
    }

    Ok((bytes, content_type))
}
