// src/models.rs
//! Database row types and shared API response shapes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// --- Sources ---

#[derive(Debug, Clone, FromRow)]
pub struct SourceRow {
    pub id: Uuid,
    pub name: String,
    pub source_type: String,
    pub config: serde_json::Value,
    pub enabled: bool,
    pub fetch_interval: String,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_count: i32,
}

impl SourceRow {
    pub const COLUMNS: &'static str = "id, name, source_type, config, enabled, \
         fetch_interval, last_fetched_at, last_error, error_count";
}

/// Derived source health: `error` at 3+ consecutive failures, `warning` at
/// one or more, `stale` when the source has never been fetched.
pub fn source_health(error_count: i32, last_fetched_at: Option<DateTime<Utc>>) -> &'static str {
    if error_count >= 3 {
        "error"
    } else if error_count >= 1 {
        "warning"
    } else if last_fetched_at.is_none() {
        "stale"
    } else {
        "healthy"
    }
}

#[derive(Debug, Serialize)]
pub struct SourceOut {
    pub id: Uuid,
    pub name: String,
    pub source_type: String,
    pub config: serde_json::Value,
    pub enabled: bool,
    pub fetch_interval: String,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_count: i32,
    pub items_today: i64,
    pub total_items: i64,
    pub health: &'static str,
}

impl SourceOut {
    pub fn from_row(row: SourceRow, items_today: i64, total_items: i64) -> Self {
        let health = source_health(row.error_count, row.last_fetched_at);
        Self {
            id: row.id,
            name: row.name,
            source_type: row.source_type,
            config: row.config,
            enabled: row.enabled,
            fetch_interval: row.fetch_interval,
            last_fetched_at: row.last_fetched_at,
            last_error: row.last_error,
            error_count: row.error_count,
            items_today,
            total_items,
            health,
        }
    }
}

// --- Categories ---

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CategoryOut {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub sort_order: i32,
}

// --- Items ---

/// An item row joined with its source's name and type.
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: Uuid,
    pub source_id: Uuid,
    pub source_name: String,
    pub source_type: String,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_starred: bool,
    pub star_note: Option<String>,
    pub extra: serde_json::Value,
}

impl ItemRow {
    pub const COLUMNS: &'static str = "i.id, i.source_id, s.name AS source_name, \
         s.source_type, i.title, i.url, i.author, i.summary, i.thumbnail_url, \
         i.published_at, i.fetched_at, i.is_read, i.is_starred, i.star_note, i.extra";
}

#[derive(Debug, Serialize)]
pub struct ItemOut {
    pub id: Uuid,
    pub source_id: Uuid,
    pub source_name: String,
    pub source_type: String,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_starred: bool,
    pub star_note: Option<String>,
    pub categories: Vec<CategoryOut>,
    pub extra: serde_json::Value,
}

impl ItemOut {
    pub fn from_row(row: ItemRow, categories: Vec<CategoryOut>) -> Self {
        Self {
            id: row.id,
            source_id: row.source_id,
            source_name: row.source_name,
            source_type: row.source_type,
            title: row.title,
            url: row.url,
            author: row.author,
            summary: row.summary,
            thumbnail_url: row.thumbnail_url,
            published_at: row.published_at,
            fetched_at: row.fetched_at,
            is_read: row.is_read,
            is_starred: row.is_starred,
            star_note: row.star_note,
            categories,
            extra: row.extra,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedItems {
    pub items: Vec<ItemOut>,
    pub total_items: i64,
    pub page: i64,
    pub items_per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct ItemStats {
    pub today_count: i64,
    pub unread_count: i64,
    pub starred_count: i64,
    pub sources_healthy: i64,
    pub sources_total: i64,
}

// --- Pipeline runs ---

#[derive(Debug, Clone, FromRow)]
pub struct PipelineRunRow {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub items_fetched: i32,
    pub items_new: i32,
    pub items_summarized: i32,
    pub errors: serde_json::Value,
    pub trigger: String,
}

#[derive(Debug, Serialize)]
pub struct PipelineRunOut {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub items_fetched: i32,
    pub items_new: i32,
    pub items_summarized: i32,
    /// Ordered per-source error records: `[{source, error}, ..]`.
    pub errors: serde_json::Value,
    pub trigger: String,
}

impl From<PipelineRunRow> for PipelineRunOut {
    fn from(r: PipelineRunRow) -> Self {
        Self {
            id: r.id,
            started_at: r.started_at,
            completed_at: r.completed_at,
            status: r.status,
            items_fetched: r.items_fetched,
            items_new: r.items_new,
            items_summarized: r.items_summarized,
            errors: r.errors,
            trigger: r.trigger,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PipelineStatus {
    pub is_running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_status: Option<String>,
    pub last_run_items_new: Option<i32>,
    pub next_run_at: Option<DateTime<Utc>>,
}

// --- Channel suggestions ---

#[derive(Debug, Clone, FromRow)]
pub struct SuggestionRow {
    pub id: Uuid,
    pub channel_id: String,
    pub channel_name: String,
    pub channel_url: String,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
    pub appearance_count: i32,
    pub sample_videos: serde_json::Value,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelSuggestionOut {
    pub id: Uuid,
    pub channel_id: String,
    pub channel_name: String,
    pub channel_url: String,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
    pub appearance_count: i32,
    pub sample_videos: serde_json::Value,
    pub status: String,
}

impl From<SuggestionRow> for ChannelSuggestionOut {
    fn from(r: SuggestionRow) -> Self {
        Self {
            id: r.id,
            channel_id: r.channel_id,
            channel_name: r.channel_name,
            channel_url: r.channel_url,
            subscriber_count: r.subscriber_count,
            video_count: r.video_count,
            appearance_count: r.appearance_count,
            sample_videos: r.sample_videos,
            status: r.status,
        }
    }
}

// --- Weekly reviews ---

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WeeklyReviewOut {
    pub id: Uuid,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub title: Option<String>,
    pub markdown: String,
    pub item_count: i32,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_thresholds() {
        let now = Some(Utc::now());
        assert_eq!(source_health(0, now), "healthy");
        assert_eq!(source_health(0, None), "stale");
        assert_eq!(source_health(1, now), "warning");
        assert_eq!(source_health(2, None), "warning");
        assert_eq!(source_health(3, now), "error");
    }
}
