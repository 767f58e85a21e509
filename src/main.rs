//! Signal Aggregator service entrypoint.
//! Boots the pool, migrations, metrics, scheduler, and the Axum HTTP server.
//!
//! Teardown order matters: the scheduler stops (finishing any in-flight run)
//! before the pool closes.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use signal_aggregator::api::{self, AppState};
use signal_aggregator::config::Settings;
use signal_aggregator::db;
use signal_aggregator::fetch::{build_http_client, FetcherDeps};
use signal_aggregator::metrics::Metrics;
use signal_aggregator::pipeline::summarizer::{OpenAiSummarizer, Summarizer};
use signal_aggregator::pipeline::{Pipeline, Scheduler};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("signal_aggregator=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Arc::new(Settings::from_env());

    let pool = db::connect(&settings.database_url).await?;
    db::migrate(&pool).await?;

    let metrics = Metrics::init();

    let http = build_http_client();
    let deps = FetcherDeps {
        pool: pool.clone(),
        http: http.clone(),
        settings: settings.clone(),
    };
    let summarizer: Arc<dyn Summarizer> = Arc::new(OpenAiSummarizer::new(
        http.clone(),
        settings.openai_api_key.clone(),
        settings.openai_model.clone(),
    ));
    let pipeline = Arc::new(Pipeline::new(pool.clone(), deps, summarizer));

    // Pool is open; now the scheduler may start.
    let scheduler = Scheduler::start(pipeline.clone(), settings.pipeline_cron.clone());

    let state = AppState {
        pool: pool.clone(),
        http,
        settings: settings.clone(),
        pipeline,
        pipeline_running: Arc::new(AtomicBool::new(false)),
    };
    let app = api::create_router(state).merge(metrics.router());

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    // Scheduler first (waits out any in-flight run), then the pool.
    scheduler.stop().await;
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
