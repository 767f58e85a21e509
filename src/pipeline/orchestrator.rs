// src/pipeline/orchestrator.rs
//! One end-to-end pipeline run: fetch from every enabled source concurrently,
//! deduplicate, persist survivors, enrich in batches, then post-process
//! discovery. Sub-step failures are recorded on the run; only a failure of
//! the orchestration sequence itself marks the run `failed`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use metrics::{counter, gauge};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::discovery;
use crate::fetch::{build_fetcher, Fetcher, RawItem};
use crate::metrics::ensure_pipeline_metrics;
use crate::models::SourceRow;

use super::dedup;
use super::summarizer::{Summarizer, SummaryRequest};
use super::{Candidate, SourceError, Trigger};

/// Per-source fetch deadline.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
const SUMMARIZE_LIMIT: i64 = 100;
const SUMMARIZE_BATCH_SIZE: usize = 10;
const SUMMARIZE_CONTENT_CHARS: usize = 1000;

struct RunStats {
    items_fetched: usize,
    items_new: u64,
    items_summarized: u64,
}

pub struct Pipeline {
    pool: PgPool,
    deps: crate::fetch::FetcherDeps,
    summarizer: Arc<dyn Summarizer>,
}

impl Pipeline {
    pub fn new(
        pool: PgPool,
        deps: crate::fetch::FetcherDeps,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            pool,
            deps,
            summarizer,
        }
    }

    /// Execute the full pipeline. Returns the pipeline-run id; the caller
    /// awaits completion of every step.
    pub async fn run(&self, trigger: Trigger) -> Result<Uuid> {
        ensure_pipeline_metrics();

        let run_id: Uuid = sqlx::query_scalar(
            "INSERT INTO pipeline_runs (status, trigger) VALUES ('running', $1) RETURNING id",
        )
        .bind(trigger.as_str())
        .fetch_one(&self.pool)
        .await
        .context("creating pipeline run record")?;

        let mut errors: Vec<SourceError> = Vec::new();

        match self.execute(&mut errors).await {
            Ok(stats) => {
                sqlx::query(
                    "UPDATE pipeline_runs
                     SET status = 'completed', completed_at = now(),
                         items_fetched = $1, items_new = $2, items_summarized = $3,
                         errors = $4
                     WHERE id = $5",
                )
                .bind(stats.items_fetched as i32)
                .bind(stats.items_new as i32)
                .bind(stats.items_summarized as i32)
                .bind(serde_json::to_value(&errors).unwrap_or_else(|_| serde_json::json!([])))
                .bind(run_id)
                .execute(&self.pool)
                .await
                .context("finalizing pipeline run record")?;

                counter!("pipeline_runs_total").increment(1);
                counter!("pipeline_items_fetched_total").increment(stats.items_fetched as u64);
                counter!("pipeline_items_new_total").increment(stats.items_new);
                counter!("pipeline_items_summarized_total").increment(stats.items_summarized);
                gauge!("pipeline_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

                info!(
                    fetched = stats.items_fetched,
                    new = stats.items_new,
                    summarized = stats.items_summarized,
                    errors = errors.len(),
                    "pipeline completed"
                );
                Ok(run_id)
            }
            Err(e) => {
                error!(error = %e, "pipeline run failed");
                errors.push(SourceError {
                    source: "pipeline".to_string(),
                    error: e.to_string(),
                });
                // Best-effort terminal transition; the original failure is
                // what surfaces to the caller.
                if let Err(update_err) = sqlx::query(
                    "UPDATE pipeline_runs
                     SET status = 'failed', completed_at = now(), errors = $1
                     WHERE id = $2",
                )
                .bind(serde_json::to_value(&errors).unwrap_or_else(|_| serde_json::json!([])))
                .bind(run_id)
                .execute(&self.pool)
                .await
                {
                    error!(error = %update_err, "failed to mark pipeline run as failed");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, errors: &mut Vec<SourceError>) -> Result<RunStats> {
        // 1. Enabled sources, each resolved to its adapter.
        let sources: Vec<SourceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM sources WHERE enabled = true",
            SourceRow::COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("loading enabled sources")?;

        let mut tasks: Vec<(SourceRow, Box<dyn Fetcher>)> = Vec::with_capacity(sources.len());
        for source in sources {
            match build_fetcher(&source.source_type, &source.config, &self.deps) {
                Some(fetcher) => tasks.push((source, fetcher)),
                None => warn!(
                    source_type = %source.source_type,
                    source = %source.name,
                    "no fetcher for source type"
                ),
            }
        }

        // 2. Fan out, one task per source, fault-isolated.
        let results = fetch_all(tasks, FETCH_TIMEOUT).await;

        // 3. Collect candidates and update per-source health.
        let mut items_fetched = 0usize;
        let mut candidates: Vec<Candidate> = Vec::new();
        for (source, outcome) in results {
            match outcome {
                Err(e) => {
                    let message = e.to_string();
                    error!(source = %source.name, error = %message, "fetch failed");
                    counter!("pipeline_source_errors_total").increment(1);
                    errors.push(SourceError {
                        source: source.name.clone(),
                        error: message.clone(),
                    });
                    sqlx::query(
                        "UPDATE sources
                         SET last_error = $1, error_count = error_count + 1, updated_at = now()
                         WHERE id = $2",
                    )
                    .bind(&message)
                    .bind(source.id)
                    .execute(&self.pool)
                    .await
                    .context("recording source failure")?;
                }
                Ok(raw_items) => {
                    items_fetched += raw_items.len();
                    for item in raw_items {
                        candidates.push(Candidate {
                            source_id: source.id,
                            item,
                        });
                    }
                    sqlx::query(
                        "UPDATE sources
                         SET last_fetched_at = now(), last_error = NULL, error_count = 0,
                             updated_at = now()
                         WHERE id = $1",
                    )
                    .bind(source.id)
                    .execute(&self.pool)
                    .await
                    .context("recording source success")?;
                }
            }
        }

        // 4. Dedup the whole batch against storage and itself.
        let new_items = dedup::deduplicate(&self.pool, candidates).await?;

        // 5. Persist survivors idempotently.
        let items_new = self.persist(&new_items).await;

        // 6. Enrich whatever is still unsummarized, newest first.
        let items_summarized = self.enrich().await?;

        // 7. Channel discovery; failures never affect run status.
        if let Err(e) = discovery::process_channel_discoveries(&self.pool).await {
            error!(error = %e, "channel discovery post-processing failed");
        }

        Ok(RunStats {
            items_fetched,
            items_new,
            items_summarized,
        })
    }

    /// Insert candidates one at a time; a URL conflict is a silent no-op and
    /// any other failure skips just that item. Returns rows actually
    /// inserted: the authoritative `items_new`, which can lag the candidate
    /// count when a concurrent writer got there first.
    async fn persist(&self, new_items: &[Candidate]) -> u64 {
        let mut inserted = 0u64;
        for candidate in new_items {
            let item = &candidate.item;
            let result = sqlx::query(
                "INSERT INTO items (source_id, external_id, title, url, author,
                                    content_raw, thumbnail_url, published_at, extra)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (url) DO NOTHING",
            )
            .bind(candidate.source_id)
            .bind(&item.external_id)
            .bind(&item.title)
            .bind(&item.url)
            .bind(&item.author)
            .bind(&item.content_raw)
            .bind(&item.thumbnail_url)
            .bind(item.published_at)
            .bind(&item.extra)
            .execute(&self.pool)
            .await;

            match result {
                Ok(done) => inserted += done.rows_affected(),
                Err(e) => {
                    let title: String = item.title.chars().take(50).collect();
                    warn!(title = %title, error = %e, "failed to insert item");
                }
            }
        }
        inserted
    }

    /// Summarize and categorize unsummarized items in fixed-size batches.
    async fn enrich(&self) -> Result<u64> {
        let unsummarized: Vec<(Uuid, String, Option<String>)> = sqlx::query_as(
            "SELECT id, title, content_raw
             FROM items
             WHERE summarized_at IS NULL
             ORDER BY created_at DESC
             LIMIT $1",
        )
        .bind(SUMMARIZE_LIMIT)
        .fetch_all(&self.pool)
        .await
        .context("loading unsummarized items")?;

        let mut total_summarized = 0u64;

        for batch in unsummarized.chunks(SUMMARIZE_BATCH_SIZE) {
            let batch_input: Vec<SummaryRequest> = batch
                .iter()
                .enumerate()
                .map(|(idx, (_, title, content))| SummaryRequest {
                    index: idx,
                    title: title.clone(),
                    content: content
                        .as_deref()
                        .map(|c| c.chars().take(SUMMARIZE_CONTENT_CHARS).collect())
                        .unwrap_or_default(),
                })
                .collect();

            let results = self.summarizer.summarize(&batch_input).await;

            for result in results {
                let Some((item_id, _, _)) = batch.get(result.index) else {
                    continue;
                };

                let confidences = result.confidence.into_vec();

                // An empty summary leaves `summarized_at` null so a later
                // run retries the item instead of recording empty content.
                if !result.summary.is_empty() {
                    sqlx::query(
                        "UPDATE items
                         SET summary = $1, summarized_at = now(), updated_at = now()
                         WHERE id = $2",
                    )
                    .bind(&result.summary)
                    .bind(item_id)
                    .execute(&self.pool)
                    .await
                    .context("writing item summary")?;
                    total_summarized += 1;
                }

                for (cat_idx, slug) in result.categories.iter().enumerate() {
                    let category_id: Option<Uuid> =
                        sqlx::query_scalar("SELECT id FROM categories WHERE slug = $1")
                            .bind(slug)
                            .fetch_optional(&self.pool)
                            .await
                            .context("resolving category slug")?;
                    let Some(category_id) = category_id else {
                        continue;
                    };
                    let confidence = confidences.get(cat_idx).copied();
                    sqlx::query(
                        "INSERT INTO item_categories (item_id, category_id, is_auto, confidence)
                         VALUES ($1, $2, true, $3)
                         ON CONFLICT (item_id, category_id) DO NOTHING",
                    )
                    .bind(item_id)
                    .bind(category_id)
                    .bind(confidence)
                    .execute(&self.pool)
                    .await
                    .context("assigning item category")?;
                }
            }
        }

        Ok(total_summarized)
    }
}

/// Run every fetch task concurrently with a per-task deadline. All outcomes
/// are collected; no failure or timeout cancels a sibling. Results come back
/// in input order.
pub async fn fetch_all(
    tasks: Vec<(SourceRow, Box<dyn Fetcher>)>,
    timeout: Duration,
) -> Vec<(SourceRow, Result<Vec<RawItem>>)> {
    let fetches = tasks.into_iter().map(|(source, fetcher)| async move {
        let outcome = match tokio::time::timeout(timeout, fetcher.fetch()).await {
            Ok(Ok(items)) => Ok(items),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(anyhow!("fetch timed out for source: {}", source.name)),
        };
        (source, outcome)
    });
    join_all(fetches).await
}
