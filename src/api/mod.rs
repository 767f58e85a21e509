// src/api/mod.rs
//! HTTP surface: CRUD over items/sources/categories/reviews, pipeline
//! trigger/status, discovery review, and settings, mounted under `/api`.

pub mod categories;
pub mod discovery;
pub mod items;
pub mod pipeline;
pub mod reviews;
pub mod settings;
pub mod sources;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::config::Settings;
use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub http: reqwest::Client,
    pub settings: Arc<Settings>,
    pub pipeline: Arc<Pipeline>,
    /// In-process guard for manual runs: single slot, second trigger rejected.
    pub pipeline_running: Arc<AtomicBool>,
}

pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .settings
        .origins_list()
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = if origins.is_empty() {
        CorsLayer::very_permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/api/health", get(health_check))
        // Items
        .route("/api/items", get(items::list_items))
        .route("/api/items/stats", get(items::item_stats))
        .route("/api/items/manual", post(items::add_manual_item))
        .route(
            "/api/items/{item_id}",
            get(items::get_item).patch(items::update_item),
        )
        // Sources
        .route(
            "/api/sources",
            get(sources::list_sources).post(sources::create_source),
        )
        .route(
            "/api/sources/{source_id}",
            get(sources::get_source)
                .patch(sources::update_source)
                .delete(sources::delete_source),
        )
        // Categories
        .route(
            "/api/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/api/categories/{category_id}",
            delete(categories::delete_category),
        )
        // Pipeline
        .route("/api/pipeline/run", post(pipeline::trigger_pipeline))
        .route("/api/pipeline/status", get(pipeline::pipeline_status))
        .route("/api/pipeline/runs", get(pipeline::list_runs))
        // Weekly reviews
        .route("/api/reviews", get(reviews::list_reviews))
        .route("/api/reviews/generate", post(reviews::generate_review))
        .route(
            "/api/reviews/{review_id}",
            get(reviews::get_review).patch(reviews::update_review),
        )
        .route(
            "/api/reviews/{review_id}/download",
            get(reviews::download_review),
        )
        // Discovery
        .route("/api/discovery/channels", get(discovery::list_suggestions))
        .route(
            "/api/discovery/channels/{suggestion_id}/accept",
            post(discovery::accept_channel),
        )
        .route(
            "/api/discovery/channels/{suggestion_id}/dismiss",
            post(discovery::dismiss_channel),
        )
        .route("/api/discovery/refresh", post(discovery::refresh_discovery))
        // Settings
        .route(
            "/api/settings",
            get(settings::get_settings).patch(settings::update_settings),
        )
        .layer(cors)
        .with_state(state)
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> ApiResult<Json<serde_json::Value>> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await?;
    Ok(Json(json!({"status": "ok"})))
}

// --- Error type ---

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    Conflict(&'static str),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, what.to_string()),
            ApiError::Conflict(what) => (StatusCode::CONFLICT, what.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({"detail": detail}))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

// touched-row helper shared by delete/dismiss handlers
pub(crate) fn require_rows(
    result: sqlx::postgres::PgQueryResult,
    what: &'static str,
) -> Result<(), ApiError> {
    if result.rows_affected() == 0 {
        Err(ApiError::NotFound(what))
    } else {
        Ok(())
    }
}
