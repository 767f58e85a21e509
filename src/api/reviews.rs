// src/api/reviews.rs
//! Weekly review endpoints: list, generate from starred items, edit, download.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::WeeklyReviewOut;
use crate::weekly::{self, ReviewItem};

use super::{ApiError, ApiResult, AppState};

const REVIEW_COLUMNS: &str =
    "id, week_start, week_end, title, markdown, item_count, generated_at";

pub async fn list_reviews(State(state): State<AppState>) -> ApiResult<Json<Vec<WeeklyReviewOut>>> {
    let rows: Vec<WeeklyReviewOut> = sqlx::query_as(&format!(
        "SELECT {REVIEW_COLUMNS} FROM weekly_reviews ORDER BY week_start DESC LIMIT 20"
    ))
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct ReviewGenerate {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub title: Option<String>,
}

pub async fn generate_review(
    State(state): State<AppState>,
    Json(body): Json<ReviewGenerate>,
) -> ApiResult<Json<WeeklyReviewOut>> {
    #[derive(sqlx::FromRow)]
    struct StarredRow {
        id: Uuid,
        title: String,
        url: String,
        summary: Option<String>,
        star_note: Option<String>,
        source_name: String,
    }

    let starred: Vec<StarredRow> = sqlx::query_as(
        "SELECT i.id, i.title, i.url, i.summary, i.star_note, s.name AS source_name
         FROM items i
         JOIN sources s ON i.source_id = s.id
         WHERE i.is_starred = true
           AND i.published_at::date >= $1
           AND i.published_at::date <= $2
         ORDER BY i.published_at DESC",
    )
    .bind(body.week_start)
    .bind(body.week_end)
    .fetch_all(&state.pool)
    .await?;

    if starred.is_empty() {
        return Err(ApiError::BadRequest(
            "No starred items in this date range".to_string(),
        ));
    }

    let mut items = Vec::with_capacity(starred.len());
    for row in starred {
        let category_names: Vec<String> = sqlx::query_scalar(
            "SELECT c.name FROM categories c
             JOIN item_categories ic ON ic.category_id = c.id
             WHERE ic.item_id = $1",
        )
        .bind(row.id)
        .fetch_all(&state.pool)
        .await?;
        items.push(ReviewItem {
            title: row.title,
            url: row.url,
            summary: row.summary.unwrap_or_default(),
            source_name: row.source_name,
            star_note: row.star_note.unwrap_or_default(),
            categories: if category_names.is_empty() {
                vec!["Uncategorized".to_string()]
            } else {
                category_names
            },
        });
    }

    let title = body.title.clone().unwrap_or_else(|| {
        format!(
            "AI Intelligence Review: {} to {}",
            body.week_start, body.week_end
        )
    });
    let markdown = weekly::generate_weekly_review(
        &state.http,
        &state.settings,
        &items,
        body.week_start,
        body.week_end,
        &title,
    )
    .await?;

    let row: WeeklyReviewOut = sqlx::query_as(&format!(
        "INSERT INTO weekly_reviews (week_start, week_end, title, markdown, item_count)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (week_start) DO UPDATE SET
             markdown = EXCLUDED.markdown,
             title = EXCLUDED.title,
             item_count = EXCLUDED.item_count,
             generated_at = now()
         RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(body.week_start)
    .bind(body.week_end)
    .bind(&title)
    .bind(&markdown)
    .bind(items.len() as i32)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(row))
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> ApiResult<Json<WeeklyReviewOut>> {
    fetch_review(&state.pool, review_id).await.map(Json)
}

async fn fetch_review(pool: &PgPool, review_id: Uuid) -> Result<WeeklyReviewOut, ApiError> {
    let row: Option<WeeklyReviewOut> = sqlx::query_as(&format!(
        "SELECT {REVIEW_COLUMNS} FROM weekly_reviews WHERE id = $1"
    ))
    .bind(review_id)
    .fetch_optional(pool)
    .await?;
    row.ok_or(ApiError::NotFound("Review not found"))
}

#[derive(Debug, Deserialize)]
pub struct ReviewUpdate {
    pub markdown: Option<String>,
    pub title: Option<String>,
}

pub async fn update_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
    Json(body): Json<ReviewUpdate>,
) -> ApiResult<Json<WeeklyReviewOut>> {
    if let Some(markdown) = &body.markdown {
        sqlx::query("UPDATE weekly_reviews SET markdown = $1 WHERE id = $2")
            .bind(markdown)
            .bind(review_id)
            .execute(&state.pool)
            .await?;
    }
    if let Some(title) = &body.title {
        sqlx::query("UPDATE weekly_reviews SET title = $1 WHERE id = $2")
            .bind(title)
            .bind(review_id)
            .execute(&state.pool)
            .await?;
    }
    fetch_review(&state.pool, review_id).await.map(Json)
}

pub async fn download_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let review = fetch_review(&state.pool, review_id).await?;
    let disposition = format!("attachment; filename=\"review-{}.md\"", review.week_start);
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        review.markdown,
    ))
}
