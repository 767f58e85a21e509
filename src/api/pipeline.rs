// src/api/pipeline.rs
//! Pipeline trigger, status, and run history.
//!
//! `POST /run` is fire-and-forget behind a single-slot atomic guard: a
//! second trigger while a manual run is in flight is rejected, not queued.

use std::sync::atomic::Ordering;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::models::{PipelineRunOut, PipelineRunRow, PipelineStatus};
use crate::pipeline::{scheduler, Trigger};

use super::{ApiResult, AppState};

pub async fn trigger_pipeline(State(state): State<AppState>) -> Json<serde_json::Value> {
    if state.pipeline_running.swap(true, Ordering::SeqCst) {
        return Json(json!({"status": "already_running"}));
    }

    let pipeline = state.pipeline.clone();
    let running = state.pipeline_running.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline.run(Trigger::Manual).await {
            error!(error = %e, "manual pipeline run failed");
        }
        running.store(false, Ordering::SeqCst);
    });

    Json(json!({"status": "started"}))
}

pub async fn pipeline_status(State(state): State<AppState>) -> ApiResult<Json<PipelineStatus>> {
    let last: Option<PipelineRunRow> = sqlx::query_as(
        "SELECT id, started_at, completed_at, status, items_fetched, items_new,
                items_summarized, errors, trigger
         FROM pipeline_runs ORDER BY started_at DESC LIMIT 1",
    )
    .fetch_optional(&state.pool)
    .await?;

    let next_run_at =
        scheduler::next_fire_after(&state.settings.pipeline_cron, chrono::Utc::now()).ok();

    Ok(Json(PipelineStatus {
        is_running: state.pipeline_running.load(Ordering::SeqCst),
        last_run_at: last.as_ref().map(|r| r.started_at),
        last_run_status: last.as_ref().map(|r| r.status.clone()),
        last_run_items_new: last.as_ref().map(|r| r.items_new),
        next_run_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

pub async fn list_runs(
    State(state): State<AppState>,
    Query(q): Query<RunsQuery>,
) -> ApiResult<Json<Vec<PipelineRunOut>>> {
    let rows: Vec<PipelineRunRow> = sqlx::query_as(
        "SELECT id, started_at, completed_at, status, items_fetched, items_new,
                items_summarized, errors, trigger
         FROM pipeline_runs ORDER BY started_at DESC LIMIT $1",
    )
    .bind(q.limit.clamp(1, 100))
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.into_iter().map(PipelineRunOut::from).collect()))
}
