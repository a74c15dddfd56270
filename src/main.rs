use std::sync::Arc;
use std::time::Duration;

use movie_night_api::{
    api::{create_router, AppState},
    config::Config,
    services::{
        embedding::OpenAiEmbedder,
        generation::OpenAiChatModel,
        observability::{LogTraceSink, OpikTraceSink, TraceSink},
        retrieval::VectorStoreRetriever,
        PipelineSettings, RecommendationPipeline,
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(config.pipeline_timeout().max(config.trace_flush_timeout()))
        .build()?;

    let trace_sink: Arc<dyn TraceSink> = match &config.opik_api_key {
        Some(api_key) => Arc::new(OpikTraceSink::new(
            http_client.clone(),
            api_key.clone(),
            config.opik_url.clone(),
            config.opik_workspace.clone(),
            config.opik_project_name.clone(),
        )),
        None => {
            tracing::warn!("OPIK_API_KEY not set, traces will only be logged");
            Arc::new(LogTraceSink)
        }
    };

    let pipeline = RecommendationPipeline::new(
        Arc::new(OpenAiEmbedder::new(
            http_client.clone(),
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
        )),
        Arc::new(VectorStoreRetriever::new(
            http_client.clone(),
            config.vector_store_token.clone(),
            config.vector_store_url.clone(),
        )),
        Arc::new(OpenAiChatModel::new(
            http_client,
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
        )),
        trace_sink,
        PipelineSettings {
            match_threshold: config.match_threshold,
            match_count: config.match_count,
            timeout: config.pipeline_timeout(),
            flush_timeout: config.trace_flush_timeout(),
        },
    );

    let allowed_origins = config.allowed_origins();
    tracing::info!(
        origins = ?allowed_origins,
        match_threshold = config.match_threshold,
        match_count = config.match_count,
        "Configuration loaded"
    );

    let app = create_router(AppState::new(pipeline, allowed_origins));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
