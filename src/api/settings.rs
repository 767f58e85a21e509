// src/api/settings.rs
//! User-editable settings stored as JSONB key/value rows.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

use super::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct SettingsOut {
    pub pipeline_cron: String,
    pub youtube_keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    pub pipeline_cron: Option<String>,
    pub youtube_keywords: Option<Vec<String>>,
}

async fn read_settings(pool: &PgPool, default_cron: &str) -> Result<SettingsOut, sqlx::Error> {
    let cron: Option<serde_json::Value> =
        sqlx::query_scalar("SELECT value FROM app_settings WHERE key = 'pipeline_cron'")
            .fetch_optional(pool)
            .await?;
    let keywords: Option<serde_json::Value> =
        sqlx::query_scalar("SELECT value FROM app_settings WHERE key = 'youtube_keywords'")
            .fetch_optional(pool)
            .await?;

    Ok(SettingsOut {
        pipeline_cron: cron
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default_cron.to_string()),
        youtube_keywords: keywords
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default(),
    })
}

pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<SettingsOut>> {
    let out = read_settings(&state.pool, &state.settings.pipeline_cron).await?;
    Ok(Json(out))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<SettingsUpdate>,
) -> ApiResult<Json<SettingsOut>> {
    if let Some(pipeline_cron) = &body.pipeline_cron {
        upsert_setting(&state.pool, "pipeline_cron", json!(pipeline_cron)).await?;
    }
    if let Some(youtube_keywords) = &body.youtube_keywords {
        upsert_setting(&state.pool, "youtube_keywords", json!(youtube_keywords)).await?;
    }
    let out = read_settings(&state.pool, &state.settings.pipeline_cron).await?;
    Ok(Json(out))
}

async fn upsert_setting(
    pool: &PgPool,
    key: &str,
    value: serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO app_settings (key, value, updated_at)
         VALUES ($1, $2, now())
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
