// src/pipeline/dedup.rs
//! Two-layer deduplication of freshly fetched candidates.
//!
//! Layer 1 drops candidates whose URL already exists in storage (one batched
//! existence check). Layer 2 drops candidates whose title is a near-duplicate
//! of anything stored in the last 48 hours. Survivors extend both in-memory
//! pools before the next candidate is evaluated, so the same story surfaced
//! by two sources in one batch keeps only its first occurrence.
//!
//! A source+external-id layer was considered and deliberately left out; URL
//! uniqueness subsumes it for every current adapter (see DESIGN.md).

use std::collections::HashSet;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{debug, info};

use super::Candidate;

pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.85;
const RECENT_TITLE_WINDOW: &str = "48 hours";

/// Partition candidates against storage, returning only the genuinely new.
pub async fn deduplicate(pool: &PgPool, candidates: Vec<Candidate>) -> Result<Vec<Candidate>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let urls: Vec<String> = candidates
        .iter()
        .filter(|c| !c.item.url.is_empty())
        .map(|c| c.item.url.clone())
        .collect();

    let existing_urls: HashSet<String> = if urls.is_empty() {
        HashSet::new()
    } else {
        sqlx::query_scalar::<_, String>("SELECT url FROM items WHERE url = ANY($1)")
            .bind(&urls)
            .fetch_all(pool)
            .await
            .context("checking existing item urls")?
            .into_iter()
            .collect()
    };

    let recent_titles: Vec<String> = sqlx::query_scalar(&format!(
        "SELECT title FROM items WHERE created_at > now() - interval '{RECENT_TITLE_WINDOW}'"
    ))
    .fetch_all(pool)
    .await
    .context("loading recent item titles")?;

    let total = candidates.len();
    let new_items = partition_new(candidates, existing_urls, recent_titles);
    info!(
        candidates = total,
        new = new_items.len(),
        "dedup: {} items in, {} new items out",
        total,
        new_items.len()
    );
    Ok(new_items)
}

/// Pure core of the dedup pass: first occurrence wins, in list order.
pub fn partition_new(
    candidates: Vec<Candidate>,
    mut existing_urls: HashSet<String>,
    mut recent_titles: Vec<String>,
) -> Vec<Candidate> {
    let mut new_items = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let url = &candidate.item.url;
        if !url.is_empty() && existing_urls.contains(url) {
            debug!(url = %url, "dedup: url match");
            continue;
        }

        if is_near_duplicate(&candidate.item.title, &recent_titles) {
            debug!(title = %candidate.item.title, "dedup: fuzzy title match");
            continue;
        }

        if !url.is_empty() {
            existing_urls.insert(url.clone());
        }
        recent_titles.push(candidate.item.title.clone());
        new_items.push(candidate);
    }

    new_items
}

/// Normalized similarity ratio between two titles: case-folded, trimmed,
/// symmetric, bounded in [0, 1], 1.0 for identical normalized strings.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(&a.trim().to_lowercase(), &b.trim().to_lowercase())
}

fn is_near_duplicate(title: &str, recent_titles: &[String]) -> bool {
    if title.is_empty() || recent_titles.is_empty() {
        return false;
    }
    recent_titles
        .iter()
        .any(|existing| title_similarity(title, existing) >= TITLE_SIMILARITY_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::RawItem;
    use uuid::Uuid;

    fn candidate(title: &str, url: &str) -> Candidate {
        Candidate {
            source_id: Uuid::nil(),
            item: RawItem {
                title: title.to_string(),
                url: url.to_string(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn identical_normalized_titles_score_one() {
        assert_eq!(title_similarity("Hello World", "Hello World"), 1.0);
        assert_eq!(title_similarity("  Hello World ", "hello world"), 1.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = "Introducing GPT-5: A New Frontier";
        let b = "Introducing GPT-5: A New Frontier in AI";
        assert_eq!(title_similarity(a, b), title_similarity(b, a));
    }

    #[test]
    fn near_identical_titles_cross_threshold() {
        let ratio = title_similarity(
            "Introducing GPT-5: A New Frontier",
            "Introducing GPT-5: A New Frontier in AI",
        );
        assert!(ratio >= TITLE_SIMILARITY_THRESHOLD, "ratio = {ratio}");
        let ratio = title_similarity("Hello World", "Goodbye");
        assert!(ratio < TITLE_SIMILARITY_THRESHOLD, "ratio = {ratio}");
    }

    #[test]
    fn empty_title_or_pool_never_matches() {
        assert!(!is_near_duplicate("", &["Anything".to_string()]));
        assert!(!is_near_duplicate("Anything", &[]));
    }

    #[test]
    fn url_layer_drops_known_urls() {
        let existing: HashSet<String> = ["https://a.example/1".to_string()].into_iter().collect();
        let kept = partition_new(
            vec![
                candidate("Fresh story", "https://a.example/1"),
                candidate("Other story", "https://a.example/2"),
            ],
            existing,
            Vec::new(),
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].item.url, "https://a.example/2");
    }

    #[test]
    fn first_occurrence_wins_within_batch() {
        let kept = partition_new(
            vec![
                candidate("Story A", "https://a.example/1"),
                candidate("Unrelated B", "https://a.example/1"),
            ],
            HashSet::new(),
            Vec::new(),
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].item.title, "Story A");
    }

    #[test]
    fn empty_url_skips_url_layer_but_not_title_layer() {
        let kept = partition_new(
            vec![
                candidate("A completely unique headline", ""),
                candidate("A completely unique headline", ""),
            ],
            HashSet::new(),
            Vec::new(),
        );
        // Second copy is caught by the fuzzy title layer.
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn mixed_batch_returns_exactly_the_new_ones() {
        // 5 candidates: 2 with stored urls, 1 near-duplicate title, 2 new.
        let existing: HashSet<String> = [
            "https://a.example/old1".to_string(),
            "https://a.example/old2".to_string(),
        ]
        .into_iter()
        .collect();
        let recent = vec!["Introducing GPT-5: A New Frontier".to_string()];
        let kept = partition_new(
            vec![
                candidate("Seen before", "https://a.example/old1"),
                candidate("Also seen", "https://a.example/old2"),
                candidate(
                    "Introducing GPT-5: A New Frontier in AI",
                    "https://a.example/new1",
                ),
                candidate("Rust 1.89 released", "https://a.example/new2"),
                candidate("Postgres 18 beta notes", "https://a.example/new3"),
            ],
            existing,
            recent,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].item.url, "https://a.example/new2");
        assert_eq!(kept[1].item.url, "https://a.example/new3");
    }
}
