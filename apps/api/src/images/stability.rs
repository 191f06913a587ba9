//! Primary provider: Stability AI Stable Diffusion 3 (paid, highest quality).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::multipart::Form;
use reqwest::Client;

use crate::images::store::{content_key, ImageStore};
use crate::images::{read_image_body, ImageError, ImageProvider, ImageRequest, ProviderResult};

pub const STABILITY_API_URL: &str = "https://api.stability.ai/v2beta/stable-image/generate/sd3";
const MODEL: &str = "sd3-large";

pub struct StabilityProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    store: Arc<dyn ImageStore>,
}

impl StabilityProvider {
    pub fn new(
        api_key: String,
        timeout: Duration,
        store: Arc<dyn ImageStore>,
    ) -> reqwest::Result<Self> {
        Self::with_endpoint(api_key, STABILITY_API_URL.to_string(), timeout, store)
    }

    pub fn with_endpoint(
        api_key: String,
        endpoint: String,
        timeout: Duration,
        store: Arc<dyn ImageStore>,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            endpoint,
            store,
        })
    }
}

#[async_trait]
impl ImageProvider for StabilityProvider {
    fn name(&self) -> &str {
        "stability"
    }

    async fn attempt(&self, request: &ImageRequest) -> Result<ProviderResult, ImageError> {
        let form = Form::new()
            .text("prompt", request.prompt.clone())
            .text("output_format", "png")
            .text("aspect_ratio", "1:1")
            .text("model", MODEL)
            .text("seed", request.seed.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "image/*")
            .multipart(form)
            .send()
            .await
            .map_err(|e| ImageError::Unavailable(e.to_string()))?;

        let (bytes, content_type) = read_image_body(response).await.map_err(|e| match e {
            ImageError::Rejected { status: 401, message } => ImageError::Rejected {
                status: 401,
                message: format!("invalid API key: {message}"),
            },
            ImageError::Rejected { status: 402, message } => ImageError::Rejected {
                status: 402,
                message: format!("insufficient credits: {message}"),
            },
            other => other,
        })?;

        let stored = self
            .store
            .persist(&content_key(&request.prompt, &content_type), bytes, &content_type)
            .await?;

        Ok(ProviderResult {
            image_url: stored.url,
            local_path: stored.local_path,
            error: None,
        })
    }
}
