// src/api/items.rs
//! Item browsing and curation endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{CategoryOut, ItemOut, ItemRow, ItemStats, PaginatedItems};

use super::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ItemListQuery {
    /// Filter on `published_at::date` (YYYY-MM-DD).
    pub date: Option<NaiveDate>,
    pub source_id: Option<Uuid>,
    /// Category slug.
    pub category: Option<String>,
    pub is_starred: Option<bool>,
    pub is_read: Option<bool>,
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_items_per_page() -> i64 {
    50
}

fn apply_filters(qb: &mut QueryBuilder<Postgres>, q: &ItemListQuery) {
    if let Some(date) = q.date {
        qb.push(" AND i.published_at::date = ").push_bind(date);
    }
    if let Some(source_id) = q.source_id {
        qb.push(" AND i.source_id = ").push_bind(source_id);
    }
    if let Some(is_starred) = q.is_starred {
        qb.push(" AND i.is_starred = ").push_bind(is_starred);
    }
    if let Some(is_read) = q.is_read {
        qb.push(" AND i.is_read = ").push_bind(is_read);
    }
    if let Some(search) = &q.search {
        let pattern = format!("%{search}%");
        qb.push(" AND (i.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR i.summary ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = &q.category {
        qb.push(
            " AND i.id IN (SELECT ic.item_id FROM item_categories ic \
             JOIN categories c ON ic.category_id = c.id WHERE c.slug = ",
        )
        .push_bind(category.clone())
        .push(")");
    }
}

async fn item_categories(pool: &PgPool, item_id: Uuid) -> Result<Vec<CategoryOut>, sqlx::Error> {
    sqlx::query_as(
        "SELECT c.id, c.name, c.slug, c.color, c.sort_order
         FROM categories c
         JOIN item_categories ic ON ic.category_id = c.id
         WHERE ic.item_id = $1
         ORDER BY c.sort_order",
    )
    .bind(item_id)
    .fetch_all(pool)
    .await
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(q): Query<ItemListQuery>,
) -> ApiResult<Json<PaginatedItems>> {
    let page = q.page.max(1);
    let items_per_page = q.items_per_page.clamp(1, 200);

    let mut count_qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM items i JOIN sources s ON i.source_id = s.id WHERE 1=1",
    );
    apply_filters(&mut count_qb, &q);
    let total_items: i64 = count_qb
        .build_query_scalar()
        .fetch_one(&state.pool)
        .await?;

    let total_pages = ((total_items + items_per_page - 1) / items_per_page).max(1);
    let offset = (page - 1) * items_per_page;

    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM items i JOIN sources s ON i.source_id = s.id WHERE 1=1",
        ItemRow::COLUMNS
    ));
    apply_filters(&mut qb, &q);
    // Keyword-search noise sinks below curated sources.
    qb.push(
        " ORDER BY CASE WHEN s.source_type = 'youtube_search' THEN 1 ELSE 0 END, \
         i.published_at DESC NULLS LAST LIMIT ",
    )
    .push_bind(items_per_page)
    .push(" OFFSET ")
    .push_bind(offset);

    let rows: Vec<ItemRow> = qb.build_query_as().fetch_all(&state.pool).await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let categories = item_categories(&state.pool, row.id).await?;
        items.push(ItemOut::from_row(row, categories));
    }

    Ok(Json(PaginatedItems {
        items,
        total_items,
        page,
        items_per_page,
        total_pages,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Defaults to server today.
    pub date: Option<NaiveDate>,
}

pub async fn item_stats(
    State(state): State<AppState>,
    Query(q): Query<StatsQuery>,
) -> ApiResult<Json<ItemStats>> {
    let date = q
        .date
        .unwrap_or_else(|| chrono::Utc::now().date_naive());

    let today_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE published_at::date = $1")
            .bind(date)
            .fetch_one(&state.pool)
            .await?;
    let unread_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM items WHERE is_read = false AND published_at::date = $1",
    )
    .bind(date)
    .fetch_one(&state.pool)
    .await?;
    let starred_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM items WHERE is_starred = true AND published_at::date = $1",
    )
    .bind(date)
    .fetch_one(&state.pool)
    .await?;
    let sources_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources")
        .fetch_one(&state.pool)
        .await?;
    let sources_healthy: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sources WHERE enabled = true AND error_count < 3")
            .fetch_one(&state.pool)
            .await?;

    Ok(Json(ItemStats {
        today_count,
        unread_count,
        starred_count,
        sources_healthy,
        sources_total,
    }))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> ApiResult<Json<ItemOut>> {
    fetch_item(&state.pool, item_id).await.map(Json)
}

async fn fetch_item(pool: &PgPool, item_id: Uuid) -> Result<ItemOut, ApiError> {
    let row: Option<ItemRow> = sqlx::query_as(&format!(
        "SELECT {} FROM items i JOIN sources s ON i.source_id = s.id WHERE i.id = $1",
        ItemRow::COLUMNS
    ))
    .bind(item_id)
    .fetch_optional(pool)
    .await?;
    let row = row.ok_or(ApiError::NotFound("Item not found"))?;
    let categories = item_categories(pool, row.id).await?;
    Ok(ItemOut::from_row(row, categories))
}

#[derive(Debug, Deserialize)]
pub struct ItemUpdate {
    pub is_read: Option<bool>,
    pub is_starred: Option<bool>,
    pub star_note: Option<String>,
    /// Replaces manual category assignments when present.
    pub category_ids: Option<Vec<Uuid>>,
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(body): Json<ItemUpdate>,
) -> ApiResult<Json<ItemOut>> {
    let has_field_updates =
        body.is_read.is_some() || body.is_starred.is_some() || body.star_note.is_some();

    if has_field_updates {
        let mut qb = QueryBuilder::new("UPDATE items SET updated_at = now()");
        if let Some(is_read) = body.is_read {
            qb.push(", is_read = ").push_bind(is_read);
        }
        if let Some(is_starred) = body.is_starred {
            qb.push(", is_starred = ").push_bind(is_starred);
        }
        if let Some(star_note) = &body.star_note {
            qb.push(", star_note = ").push_bind(star_note.clone());
        }
        qb.push(" WHERE id = ").push_bind(item_id);
        qb.build().execute(&state.pool).await?;
    }

    if let Some(category_ids) = &body.category_ids {
        sqlx::query("DELETE FROM item_categories WHERE item_id = $1")
            .bind(item_id)
            .execute(&state.pool)
            .await?;
        for category_id in category_ids {
            sqlx::query(
                "INSERT INTO item_categories (item_id, category_id, is_auto)
                 VALUES ($1, $2, false) ON CONFLICT DO NOTHING",
            )
            .bind(item_id)
            .bind(category_id)
            .execute(&state.pool)
            .await?;
        }
    }

    fetch_item(&state.pool, item_id).await.map(Json)
}

#[derive(Debug, Deserialize)]
pub struct ManualItemCreate {
    pub title: String,
    pub url: String,
    pub content_raw: Option<String>,
    #[serde(default = "default_manual_source")]
    pub source_name: String,
}

fn default_manual_source() -> String {
    "Manual".to_string()
}

pub async fn add_manual_item(
    State(state): State<AppState>,
    Json(body): Json<ManualItemCreate>,
) -> ApiResult<Json<ItemOut>> {
    let source_id: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM sources WHERE source_type = 'manual' AND name = $1")
            .bind(&body.source_name)
            .fetch_optional(&state.pool)
            .await?;
    let source_id = match source_id {
        Some(id) => id,
        None => {
            sqlx::query_scalar(
                "INSERT INTO sources (name, source_type, config, enabled)
                 VALUES ($1, 'manual', '{}', true) RETURNING id",
            )
            .bind(&body.source_name)
            .fetch_one(&state.pool)
            .await?
        }
    };

    let item_id: Option<Uuid> = sqlx::query_scalar(
        "INSERT INTO items (source_id, title, url, content_raw, published_at)
         VALUES ($1, $2, $3, $4, now())
         ON CONFLICT (url) DO NOTHING
         RETURNING id",
    )
    .bind(source_id)
    .bind(&body.title)
    .bind(&body.url)
    .bind(&body.content_raw)
    .fetch_optional(&state.pool)
    .await?;

    let item_id = item_id.ok_or(ApiError::Conflict("Item with this URL already exists"))?;
    fetch_item(&state.pool, item_id).await.map(Json)
}
