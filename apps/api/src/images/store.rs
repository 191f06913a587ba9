//! Image persistence. Objects are keyed by a hash of the prompt, so writing the
//! same prompt twice is a no-op and concurrent writers cannot conflict.

use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::images::ImageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub url: String,
    pub local_path: Option<PathBuf>,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn persist(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredImage, ImageError>;
}

/// `image_<first 10 hex chars of sha256(prompt)>.<ext>`
pub fn content_key(prompt: &str, content_type: &str) -> String {
    let digest = hex::encode(Sha256::digest(prompt.as_bytes()));
    format!("image_{}.{}", &digest[..10], extension_for(content_type))
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type.split(';').next().unwrap_or_default().trim() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Local directory served under /images
// ────────────────────────────────────────────────────────────────────────────

pub struct LocalImageStore {
    dir: PathBuf,
    base_url: String,
}

impl LocalImageStore {
    pub fn new(dir: PathBuf, base_url: String) -> Self {
        Self { dir, base_url }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn persist(
        &self,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<StoredImage, ImageError> {
        let path = self.dir.join(key);

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| ImageError::Store(format!("cannot stat {}: {e}", path.display())))?;

        if exists {
            debug!(path = %path.display(), "Image already stored, skipping write");
        } else {
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| ImageError::Store(format!("cannot create {}: {e}", self.dir.display())))?;
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(|e| ImageError::Store(format!("cannot write {}: {e}", path.display())))?;
            debug!(path = %path.display(), bytes = bytes.len(), "Image stored");
        }

        Ok(StoredImage {
            url: format!("{}/images/{key}", self.base_url),
            local_path: Some(path),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// S3 / MinIO durable asset store
// ────────────────────────────────────────────────────────────────────────────

pub struct S3AssetStore {
    client: S3Client,
    bucket: String,
    public_url: String,
}

impl S3AssetStore {
    pub fn new(client: S3Client, bucket: String, public_url: String) -> Self {
        Self {
            client,
            bucket,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageStore for S3AssetStore {
    async fn persist(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredImage, ImageError> {
        let stored = StoredImage {
            url: format!("{}/{key}", self.public_url),
            local_path: None,
        };

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => {
                debug!(bucket = %self.bucket, key, "Image already in asset store, skipping upload");
                return Ok(stored);
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {}
            Err(e) => {
                return Err(ImageError::Store(format!("S3 lookup of {key} failed: {e}")));
            }
        }

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ImageError::Store(format!("S3 upload of {key} failed: {e}")))?;

        debug!(bucket = %self.bucket, key, "Image uploaded to asset store");

        Ok(stored)
    }
}
