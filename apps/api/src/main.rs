mod analysis;
mod config;
mod errors;
mod models;
mod routes;
mod state;
mod stores;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::pipeline::Pipeline;
use crate::analysis::preview::{HttpPreviewRenderer, PreviewRenderer};
use crate::analysis::service::{AnalysisService, ClaudeAnalysisService};
use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;
use crate::stores::redis::RedisRecordStore;
use crate::stores::s3::S3DocumentStore;
use crate::stores::{DocumentStore, RecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Resume Analyzer API v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize Redis record store
    let redis = redis::Client::open(config.redis_url.clone())?;
    let records: Arc<dyn RecordStore> = Arc::new(RedisRecordStore::new(redis));
    info!("Redis record store initialized");

    // Initialize S3 / MinIO document store
    let s3 = build_s3_client(&config).await;
    let documents: Arc<dyn DocumentStore> =
        Arc::new(S3DocumentStore::new(s3, config.s3_bucket.clone()));
    info!("S3 document store initialized (bucket: {})", config.s3_bucket);

    // Initialize preview renderer client
    let renderer: Arc<dyn PreviewRenderer> = Arc::new(HttpPreviewRenderer::new(
        config.preview_renderer_url.clone(),
    ));
    info!("Preview renderer client initialized");

    // Initialize analysis service
    let analysis_service: Arc<dyn AnalysisService> = Arc::new(ClaudeAnalysisService::new(
        config.anthropic_api_key.clone(),
        Arc::clone(&documents),
    ));
    info!(
        "Analysis service initialized (model: {})",
        analysis::service::MODEL
    );

    // Build the pipeline and app state
    let pipeline = Pipeline::new(
        documents,
        Arc::clone(&records),
        renderer,
        analysis_service,
    );
    let state = AppState { pipeline, records };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "resume-analyzer-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
