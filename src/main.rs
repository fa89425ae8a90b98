use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hoops_aggregator::config::AggregatorConfig;
use hoops_aggregator::http_client::build_http_client;
use hoops_aggregator::orchestrator::Aggregator;
use hoops_aggregator::server::{AppState, router};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hoops_aggregator=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = AggregatorConfig::from_env()?;
    let client = build_http_client()?;
    let aggregator = Aggregator::from_config(&cfg, client);
    let shutdown = aggregator.shutdown_token();
    let app = router(Arc::new(AppState { aggregator }));

    info!(
        bind = %cfg.bind_addr,
        recruiting_class = cfg.recruiting_class,
        enrich = cfg.enrich_enabled,
        deadline_secs = cfg.aggregate_deadline.as_secs(),
        "hoops aggregator listening"
    );

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            shutdown.cancel();
        })
        .await
        .context("server error")?;
    Ok(())
}
