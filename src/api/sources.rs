// src/api/sources.rs
//! Source CRUD with per-source item counts and derived health.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{SourceOut, SourceRow};

use super::{require_rows, ApiError, ApiResult, AppState};

async fn with_counts(pool: &PgPool, row: SourceRow) -> Result<SourceOut, sqlx::Error> {
    let total_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE source_id = $1")
        .bind(row.id)
        .fetch_one(pool)
        .await?;
    let items_today: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM items WHERE source_id = $1 AND published_at::date = CURRENT_DATE",
    )
    .bind(row.id)
    .fetch_one(pool)
    .await?;
    Ok(SourceOut::from_row(row, items_today, total_items))
}

pub async fn list_sources(State(state): State<AppState>) -> ApiResult<Json<Vec<SourceOut>>> {
    let rows: Vec<SourceRow> = sqlx::query_as(&format!(
        "SELECT {} FROM sources ORDER BY name",
        SourceRow::COLUMNS
    ))
    .fetch_all(&state.pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(with_counts(&state.pool, row).await?);
    }
    Ok(Json(out))
}

#[derive(Debug, Deserialize)]
pub struct SourceCreate {
    pub name: String,
    pub source_type: String,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval: String,
}

fn default_config() -> serde_json::Value {
    json!({})
}

fn default_enabled() -> bool {
    true
}

fn default_fetch_interval() -> String {
    "12 hours".to_string()
}

pub async fn create_source(
    State(state): State<AppState>,
    Json(body): Json<SourceCreate>,
) -> ApiResult<Json<SourceOut>> {
    let row: SourceRow = sqlx::query_as(&format!(
        "INSERT INTO sources (name, source_type, config, enabled, fetch_interval)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {}",
        SourceRow::COLUMNS
    ))
    .bind(&body.name)
    .bind(&body.source_type)
    .bind(&body.config)
    .bind(body.enabled)
    .bind(&body.fetch_interval)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(SourceOut::from_row(row, 0, 0)))
}

pub async fn get_source(
    State(state): State<AppState>,
    Path(source_id): Path<Uuid>,
) -> ApiResult<Json<SourceOut>> {
    fetch_source(&state.pool, source_id).await.map(Json)
}

async fn fetch_source(pool: &PgPool, source_id: Uuid) -> Result<SourceOut, ApiError> {
    let row: Option<SourceRow> = sqlx::query_as(&format!(
        "SELECT {} FROM sources WHERE id = $1",
        SourceRow::COLUMNS
    ))
    .bind(source_id)
    .fetch_optional(pool)
    .await?;
    let row = row.ok_or(ApiError::NotFound("Source not found"))?;
    Ok(with_counts(pool, row).await?)
}

#[derive(Debug, Deserialize)]
pub struct SourceUpdate {
    pub name: Option<String>,
    pub config: Option<serde_json::Value>,
    pub enabled: Option<bool>,
    pub fetch_interval: Option<String>,
}

pub async fn update_source(
    State(state): State<AppState>,
    Path(source_id): Path<Uuid>,
    Json(body): Json<SourceUpdate>,
) -> ApiResult<Json<SourceOut>> {
    let has_updates = body.name.is_some()
        || body.config.is_some()
        || body.enabled.is_some()
        || body.fetch_interval.is_some();

    if has_updates {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE sources SET updated_at = now()");
        if let Some(name) = &body.name {
            qb.push(", name = ").push_bind(name.clone());
        }
        if let Some(config) = &body.config {
            qb.push(", config = ").push_bind(config.clone());
        }
        if let Some(enabled) = body.enabled {
            qb.push(", enabled = ").push_bind(enabled);
        }
        if let Some(fetch_interval) = &body.fetch_interval {
            qb.push(", fetch_interval = ").push_bind(fetch_interval.clone());
        }
        qb.push(" WHERE id = ").push_bind(source_id);
        qb.build().execute(&state.pool).await?;
    }

    fetch_source(&state.pool, source_id).await.map(Json)
}

pub async fn delete_source(
    State(state): State<AppState>,
    Path(source_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM sources WHERE id = $1")
        .bind(source_id)
        .execute(&state.pool)
        .await?;
    require_rows(result, "Source not found")?;
    Ok(Json(json!({"status": "deleted"})))
}
