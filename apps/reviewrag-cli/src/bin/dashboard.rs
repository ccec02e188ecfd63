use anyhow::Context;
use std::sync::Arc;

use reviewrag_analyst::Analyzer;
use reviewrag_cli::dashboard::{router, AppState};
use reviewrag_cli::{db_dir, init_logging};
use reviewrag_core::config::Config;
use reviewrag_embed::get_default_embedder;
use reviewrag_vector::ReviewSearchEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let settings = Config::load()?.settings()?;

    let embedder = get_default_embedder(&settings.embedding)?;
    let engine = ReviewSearchEngine::open(&db_dir(&settings)?, &settings.data.collection, embedder)
        .await
        .context("Error loading system; run reviewrag-indexer first")?;
    let stats = engine.stats().await?;
    tracing::info!(total = stats.total_reviews, range = %stats.date_range(), "collection loaded");

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = Arc::new(AppState { analyzer: Analyzer::new(Arc::new(engine)), settings, stats });
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {}", addr))?;
    tracing::info!("dashboard listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
