// src/discovery.rs
//! Channel discovery post-processor.
//!
//! Scans recently ingested search results for channels that are not yet
//! tracked as sources, and aggregates them into reviewable suggestions.
//! Counts accumulate across runs while a suggestion is still pending;
//! accepted and dismissed suggestions are frozen.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;

const DISCOVERY_WINDOW: &str = "30 days";
const MAX_SAMPLE_VIDEOS: usize = 5;

#[derive(Debug)]
struct ChannelAggregate {
    channel_name: String,
    appearance_count: i32,
    sample_videos: Vec<String>,
}

/// Aggregate channel sightings from recent search items and upsert one
/// suggestion row per channel. Returns the number of rows touched.
pub async fn process_channel_discoveries(pool: &PgPool) -> Result<u64> {
    // Channels already backing a tracked source are never suggested.
    let tracked_configs: Vec<serde_json::Value> =
        sqlx::query_scalar("SELECT config FROM sources WHERE source_type = 'youtube_channel'")
            .fetch_all(pool)
            .await
            .context("loading tracked channels")?;
    let tracked_ids: Vec<String> = tracked_configs
        .iter()
        .filter_map(|c| c.get("channel_id").and_then(|v| v.as_str()))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let extras: Vec<serde_json::Value> = sqlx::query_scalar(&format!(
        "SELECT extra FROM items
         WHERE extra->>'channel_id' IS NOT NULL
           AND extra->>'search_keyword' IS NOT NULL
           AND created_at > now() - interval '{DISCOVERY_WINDOW}'"
    ))
    .fetch_all(pool)
    .await
    .context("loading recent search items")?;

    let channels = aggregate_channels(&extras, &tracked_ids);

    let mut touched = 0u64;
    for (channel_id, data) in channels {
        let channel_url = format!("https://www.youtube.com/channel/{channel_id}");
        let result = sqlx::query(
            "INSERT INTO channel_suggestions
                 (channel_id, channel_name, channel_url, appearance_count, sample_videos)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (channel_id) DO UPDATE SET
                 appearance_count = channel_suggestions.appearance_count
                     + EXCLUDED.appearance_count,
                 sample_videos = EXCLUDED.sample_videos,
                 updated_at = now()
             WHERE channel_suggestions.status = 'pending'",
        )
        .bind(&channel_id)
        .bind(&data.channel_name)
        .bind(&channel_url)
        .bind(data.appearance_count)
        .bind(json!(data.sample_videos))
        .execute(pool)
        .await
        .context("upserting channel suggestion")?;
        touched += result.rows_affected();
    }

    info!(suggestions = touched, "channel discovery processed");
    Ok(touched)
}

/// Count appearances per untracked channel and keep a few sample video ids.
fn aggregate_channels(
    extras: &[serde_json::Value],
    tracked_ids: &[String],
) -> BTreeMap<String, ChannelAggregate> {
    let mut channels: BTreeMap<String, ChannelAggregate> = BTreeMap::new();

    for extra in extras {
        let channel_id = extra
            .get("channel_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if channel_id.is_empty() || tracked_ids.iter().any(|t| t == channel_id) {
            continue;
        }
        let channel_title = extra
            .get("channel_title")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let video_id = extra
            .get("video_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let entry = channels
            .entry(channel_id.to_string())
            .or_insert_with(|| ChannelAggregate {
                channel_name: channel_title.to_string(),
                appearance_count: 0,
                sample_videos: Vec::new(),
            });
        entry.appearance_count += 1;
        if entry.sample_videos.len() < MAX_SAMPLE_VIDEOS
            && !video_id.is_empty()
            && !entry.sample_videos.iter().any(|v| v == video_id)
        {
            entry.sample_videos.push(video_id.to_string());
        }
    }

    channels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sighting(channel_id: &str, title: &str, video_id: &str) -> serde_json::Value {
        json!({
            "channel_id": channel_id,
            "channel_title": title,
            "video_id": video_id,
            "search_keyword": "ai agents",
        })
    }

    #[test]
    fn counts_appearances_and_caps_samples() {
        let extras: Vec<_> = (0..8)
            .map(|i| sighting("UC123", "Some Channel", &format!("vid{i}")))
            .collect();
        let channels = aggregate_channels(&extras, &[]);
        let agg = &channels["UC123"];
        assert_eq!(agg.appearance_count, 8);
        assert_eq!(agg.sample_videos.len(), MAX_SAMPLE_VIDEOS);
        assert_eq!(agg.channel_name, "Some Channel");
    }

    #[test]
    fn tracked_channels_are_excluded() {
        let extras = vec![
            sighting("UC_tracked", "Tracked", "v1"),
            sighting("UC_new", "New Channel", "v2"),
        ];
        let channels = aggregate_channels(&extras, &["UC_tracked".to_string()]);
        assert!(!channels.contains_key("UC_tracked"));
        assert!(channels.contains_key("UC_new"));
    }

    #[test]
    fn duplicate_sample_videos_are_kept_once() {
        let extras = vec![
            sighting("UC1", "C", "same"),
            sighting("UC1", "C", "same"),
            sighting("UC1", "C", "other"),
        ];
        let channels = aggregate_channels(&extras, &[]);
        assert_eq!(channels["UC1"].appearance_count, 3);
        assert_eq!(channels["UC1"].sample_videos, vec!["same", "other"]);
    }
}
