// src/api/discovery.rs
//! Channel suggestion review: list pending, accept (promote to a tracked
//! source), dismiss, and on-demand refresh.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::discovery::process_channel_discoveries;
use crate::models::{ChannelSuggestionOut, SuggestionRow};

use super::{require_rows, ApiError, ApiResult, AppState};

const SUGGESTION_COLUMNS: &str = "id, channel_id, channel_name, channel_url, \
     subscriber_count, video_count, appearance_count, sample_videos, status";

pub async fn list_suggestions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ChannelSuggestionOut>>> {
    let rows: Vec<SuggestionRow> = sqlx::query_as(&format!(
        "SELECT {SUGGESTION_COLUMNS} FROM channel_suggestions
         WHERE status = 'pending'
         ORDER BY appearance_count DESC"
    ))
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(
        rows.into_iter().map(ChannelSuggestionOut::from).collect(),
    ))
}

pub async fn accept_channel(
    State(state): State<AppState>,
    Path(suggestion_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let row: Option<SuggestionRow> = sqlx::query_as(&format!(
        "SELECT {SUGGESTION_COLUMNS} FROM channel_suggestions WHERE id = $1"
    ))
    .bind(suggestion_id)
    .fetch_optional(&state.pool)
    .await?;
    let row = row.ok_or(ApiError::NotFound("Suggestion not found"))?;

    sqlx::query(
        "INSERT INTO sources (name, source_type, config, enabled)
         VALUES ($1, 'youtube_channel', $2, true)",
    )
    .bind(&row.channel_name)
    .bind(json!({"channel_id": row.channel_id}))
    .execute(&state.pool)
    .await?;

    sqlx::query(
        "UPDATE channel_suggestions SET status = 'accepted', updated_at = now() WHERE id = $1",
    )
    .bind(suggestion_id)
    .execute(&state.pool)
    .await?;

    Ok(Json(json!({"status": "accepted"})))
}

pub async fn dismiss_channel(
    State(state): State<AppState>,
    Path(suggestion_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let result = sqlx::query(
        "UPDATE channel_suggestions SET status = 'dismissed', updated_at = now() WHERE id = $1",
    )
    .bind(suggestion_id)
    .execute(&state.pool)
    .await?;
    require_rows(result, "Suggestion not found")?;
    Ok(Json(json!({"status": "dismissed"})))
}

pub async fn refresh_discovery(
    State(state): State<AppState>,
) -> ApiResult<Json<serde_json::Value>> {
    let count = process_channel_discoveries(&state.pool).await?;
    Ok(Json(json!({"suggestions_updated": count})))
}
