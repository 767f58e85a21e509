// src/api/categories.rs
//! Category taxonomy endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::models::CategoryOut;

use super::{require_rows, ApiResult, AppState};

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<CategoryOut>>> {
    let rows: Vec<CategoryOut> = sqlx::query_as(
        "SELECT id, name, slug, color, sort_order FROM categories ORDER BY sort_order",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct CategoryCreate {
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CategoryCreate>,
) -> ApiResult<Json<CategoryOut>> {
    let row: CategoryOut = sqlx::query_as(
        "INSERT INTO categories (name, slug, color, sort_order)
         VALUES ($1, $2, $3, $4)
         RETURNING id, name, slug, color, sort_order",
    )
    .bind(&body.name)
    .bind(&body.slug)
    .bind(&body.color)
    .bind(body.sort_order)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(row))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    sqlx::query("DELETE FROM item_categories WHERE category_id = $1")
        .bind(category_id)
        .execute(&state.pool)
        .await?;
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(&state.pool)
        .await?;
    require_rows(result, "Category not found")?;
    Ok(Json(json!({"status": "deleted"})))
}
