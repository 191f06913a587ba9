mod config;
mod errors;
mod generation;
mod images;
mod llm_client;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AssetStoreConfig, Config};
use crate::generation::pipeline::ContentPipeline;
use crate::generation::retry::RetryPolicy;
use crate::images::placeholder::PlaceholderImage;
use crate::images::pollinations::PollinationsProvider;
use crate::images::stability::StabilityProvider;
use crate::images::store::{ImageStore, LocalImageStore, S3AssetStore};
use crate::images::{ImageProvider, ImageProviderChain};
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Post Generator API v{}", env!("CARGO_PKG_VERSION"));

    tokio::fs::create_dir_all(&config.images_dir)
        .await
        .with_context(|| format!("cannot create images directory {:?}", config.images_dir))?;

    let local_store: Arc<dyn ImageStore> = Arc::new(LocalImageStore::new(
        config.images_dir.clone(),
        config.base_url.clone(),
    ));

    // Durable store for the secondary provider when S3 / MinIO is configured
    let secondary_store = match &config.asset_store {
        Some(store_config) => {
            let s3 = build_s3_client(store_config).await;
            info!(bucket = %store_config.bucket, "S3 asset store initialized");
            Arc::new(S3AssetStore::new(
                s3,
                store_config.bucket.clone(),
                store_config.public_url.clone(),
            )) as Arc<dyn ImageStore>
        }
        None => Arc::clone(&local_store),
    };

    let mut providers: Vec<Box<dyn ImageProvider>> = Vec::new();
    match &config.stability_api_key {
        Some(key) => providers.push(Box::new(StabilityProvider::new(
            key.clone(),
            config.primary_image_timeout,
            Arc::clone(&local_store),
        )?)),
        None => info!("STABILITY_API_KEY not set; primary image provider disabled"),
    }
    providers.push(Box::new(PollinationsProvider::new(
        &config.secondary_image_url,
        config.secondary_image_timeout,
        secondary_store,
    )?));

    let placeholder = PlaceholderImage::new(config.images_dir.clone(), config.base_url.clone());
    let images = ImageProviderChain::new(providers, placeholder);
    info!(providers = ?images.provider_names(), "Image provider chain initialized");

    let text = GeminiClient::new(
        config.google_api_key.clone(),
        config.text_api_url.clone(),
        config.text_timeout,
    )?;
    info!("Text generation client initialized (model: {})", llm_client::MODEL);

    let policy = RetryPolicy {
        max_attempts: config.max_retries,
        quota_backoff: config.quota_backoff,
        retry_backoff: config.retry_backoff,
    };

    let state = AppState {
        pipeline: Arc::new(ContentPipeline::new(Arc::new(text), images, policy)),
    };

    let app = build_router(state, &config.images_dir)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client for MinIO (local) or AWS (production).
/// Path-style addressing keeps MinIO URLs of the form `<endpoint>/<bucket>/<key>`.
async fn build_s3_client(config: &AssetStoreConfig) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        None,
        None,
        "postgen-static",
    );

    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
