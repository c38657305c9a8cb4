mod analysis;
mod config;
mod db;
mod errors;
mod history;
mod language;
mod llm_client;
mod models;
mod report;
mod review;
mod routes;
mod state;
mod store;
mod upload;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::{CodeAnalyzer, HeuristicAnalyzer, LlmAnalyzer};
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::report::PdfRenderer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryReviewStore, PgReviewStore, ReviewStore};
use crate::upload::orchestrator::ReviewService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Code Review Assistant v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn ReviewStore> = match &config.database_url {
        Some(url) => Arc::new(PgReviewStore::new(create_pool(url).await?)),
        None => {
            warn!("DATABASE_URL not set; reviews are kept in memory and lost on restart");
            Arc::new(MemoryReviewStore::new())
        }
    };

    let analyzer: Arc<dyn CodeAnalyzer> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone(), config.analysis_timeout)?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Arc::new(LlmAnalyzer::new(llm))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; using the offline heuristic analyzer");
            Arc::new(HeuristicAnalyzer::new())
        }
    };

    let renderer = Arc::new(PdfRenderer::new(config.reports_dir.clone()));
    info!("PDF reports directory: {}", renderer.reports_dir().display());

    let service = ReviewService::new(
        store.clone(),
        analyzer,
        renderer,
        config.upload_policy(),
    )
    .with_timeouts(config.analysis_timeout, config.render_timeout);

    let state = AppState {
        service: Arc::new(service),
        store,
        config: config.clone(),
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
