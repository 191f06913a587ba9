//! Secondary provider: free Pollinations-style endpoint that takes the prompt in the
//! URL path and answers with image bytes. Results go to the durable asset store when
//! one is configured.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::images::store::{content_key, ImageStore};
use crate::images::{read_image_body, ImageError, ImageProvider, ImageRequest, ProviderResult};

const IMAGE_SIZE: &str = "1080";

pub struct PollinationsProvider {
    client: Client,
    endpoint: Url,
    store: Arc<dyn ImageStore>,
}

impl PollinationsProvider {
    pub fn new(
        endpoint: &str,
        timeout: Duration,
        store: Arc<dyn ImageStore>,
    ) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("invalid secondary image endpoint '{endpoint}'"))?;
        if endpoint.cannot_be_a_base() {
            bail!("secondary image endpoint '{endpoint}' cannot take a path");
        }

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint,
            store,
        })
    }

    /// `<endpoint>/<percent-encoded prompt>?width=..&height=..&seed=..&nologo=true`
    fn request_url(&self, request: &ImageRequest) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&request.prompt);
        }
        url.query_pairs_mut()
            .append_pair("width", IMAGE_SIZE)
            .append_pair("height", IMAGE_SIZE)
            .append_pair("seed", &request.seed.to_string())
            .append_pair("nologo", "true");
        url
    }
}

#[async_trait]
impl ImageProvider for PollinationsProvider {
    fn name(&self) -> &str {
        "pollinations"
    }

    async fn attempt(&self, request: &ImageRequest) -> Result<ProviderResult, ImageError> {
        let response = self
            .client
            .get(self.request_url(request))
            .send()
            .await
            .map_err(|e| ImageError::Unavailable(e.to_string()))?;

        let (bytes, content_type) = read_image_body(response).await?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::store::LocalImageStore;
    use wiremock::matchers::{method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(endpoint: &str, dir: &tempfile::TempDir) -> PollinationsProvider {
        let store = Arc::new(LocalImageStore::new(
            dir.path().to_path_buf(),
            "http://localhost:8000".to_string(),
        ));
        PollinationsProvider::new(endpoint, Duration::from_secs(5), store).unwrap()
    }

    fn request() -> ImageRequest {
        ImageRequest {
            prompt: "Professional photography of bread: sourdough/rye loaf".to_string(),
            seed: 7,
        }
    }

    #[test]
    fn test_prompt_is_a_single_encoded_path_segment() {
        let dir = tempfile::tempdir().unwrap();
        let url = provider("https://image.example/prompt", &dir).request_url(&request());

        let segments: Vec<_> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "prompt");
        assert!(!segments[1].contains('/'));
        assert!(!segments[1].contains(' '));
        assert!(url.query().unwrap().contains("seed=7"));
    }

    #[test]
    fn test_rejects_non_base_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalImageStore::new(dir.path().to_path_buf(), "http://h".to_string()));
        assert!(PollinationsProvider::new("mailto:a@b.c", Duration::from_secs(1), store).is_err());
    }

    #[tokio::test]
    async fn test_jpeg_response_is_stored() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path_regex("^/prompt/.+"))
            .and(query_param("width", "1080"))
            .and(query_param("nologo", "true"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(b"jpeg bytes".to_vec(), "image/jpeg"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&format!("{}/prompt", server.uri()), &dir)
            .attempt(&request())
            .await
            .unwrap();

        assert!(result.image_url.ends_with(".jpg"));
        assert_eq!(std::fs::read(result.local_path.unwrap()).unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_text_body_with_200_is_not_success() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("rate limited, try later"))
            .mount(&server)
            .await;

        let err = provider(&format!("{}/prompt", server.uri()), &dir)
            .attempt(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::NotAnImage { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_server_error_is_rejected() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = provider(&format!("{}/prompt", server.uri()), &dir)
            .attempt(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::Rejected { status: 502, .. }), "got {err:?}");
    }
}
