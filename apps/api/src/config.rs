use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if a required variable is missing or a numeric one is malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: String,
    pub text_api_url: String,
    pub stability_api_key: Option<String>,
    pub secondary_image_url: String,
    pub base_url: String,
    pub images_dir: PathBuf,
    pub asset_store: Option<AssetStoreConfig>,
    pub max_retries: u32,
    pub quota_backoff: Duration,
    pub retry_backoff: Duration,
    pub text_timeout: Duration,
    pub primary_image_timeout: Duration,
    pub secondary_image_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

/// S3 / MinIO settings for the durable asset store. Only present when `S3_BUCKET` is set.
#[derive(Debug, Clone)]
pub struct AssetStoreConfig {
    pub bucket: String,
    pub endpoint: String,
    pub public_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let asset_store = match optional_env("S3_BUCKET") {
            Some(bucket) => {
                let endpoint = require_env("S3_ENDPOINT")?;
                Some(AssetStoreConfig {
                    public_url: optional_env("S3_PUBLIC_URL")
                        .unwrap_or_else(|| format!("{}/{bucket}", endpoint.trim_end_matches('/'))),
                    bucket,
                    endpoint,
                    access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                    secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
                })
            }
            None => None,
        };

        Ok(Config {
            google_api_key: require_env("GOOGLE_API_KEY")?,
            text_api_url: optional_env("TEXT_API_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            stability_api_key: optional_env("STABILITY_API_KEY"),
            secondary_image_url: optional_env("SECONDARY_IMAGE_URL")
                .unwrap_or_else(|| "https://image.pollinations.ai/prompt".to_string()),
            base_url: optional_env("BASE_URL")
                .unwrap_or_else(|| "http://localhost:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
            images_dir: PathBuf::from(
                optional_env("IMAGES_DIR").unwrap_or_else(|| "generated_images".to_string()),
            ),
            asset_store,
            max_retries: parse_env("MAX_RETRIES", 2)?,
            quota_backoff: Duration::from_secs(parse_env("QUOTA_BACKOFF_SECS", 10)?),
            retry_backoff: Duration::from_secs(parse_env("RETRY_BACKOFF_SECS", 2)?),
            text_timeout: Duration::from_secs(parse_env("TEXT_TIMEOUT_SECS", 25)?),
            primary_image_timeout: Duration::from_secs(parse_env(
                "PRIMARY_IMAGE_TIMEOUT_SECS",
                60,
            )?),
            secondary_image_timeout: Duration::from_secs(parse_env(
                "SECONDARY_IMAGE_TIMEOUT_SECS",
                30,
            )?),
            port: parse_env("PORT", 8000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
