// src/fetch/youtube.rs
//! YouTube Data API v3 adapters: channel uploads and keyword search.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::Settings;

use super::github::parse_rfc3339;
use super::{config_str, config_u64, truncate_content, Fetcher, FetcherDeps, RawItem};

const YOUTUBE_API: &str = "https://www.googleapis.com/youtube/v3";

/// Titles containing CJK, Arabic, Cyrillic, Thai, Devanagari, or Hangul
/// characters are dropped from search results.
static NON_LATIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "[\\x{0400}-\\x{04FF}\\x{0600}-\\x{06FF}\\x{0900}-\\x{097F}\
         \\x{0E00}-\\x{0E7F}\\x{3000}-\\x{9FFF}\\x{AC00}-\\x{D7AF}]",
    )
    .expect("non-latin regex")
});

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    items: Vec<ChannelResource>,
}

#[derive(Debug, Deserialize)]
struct ChannelResource {
    id: Option<String>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize, Default)]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
    #[serde(rename = "channelTitle")]
    channel_title: Option<String>,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
    #[serde(rename = "resourceId")]
    resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: Option<SearchId>,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
struct VideoStatistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
}

impl Snippet {
    fn best_thumbnail(&self) -> Option<String> {
        for key in ["high", "medium", "default"] {
            if let Some(url) = self.thumbnails.get(key).and_then(|t| t.url.clone()) {
                return Some(url);
            }
        }
        None
    }
}

fn video_item(snippet: &Snippet, video_id: &str, search_keyword: Option<&str>) -> RawItem {
    let mut extra = json!({
        "channel_id": snippet.channel_id,
        "channel_title": snippet.channel_title,
        "video_id": video_id,
    });
    if let Some(keyword) = search_keyword {
        extra["search_keyword"] = json!(keyword);
    }
    RawItem {
        external_id: Some(video_id.to_string()),
        title: snippet
            .title
            .clone()
            .unwrap_or_else(|| "Untitled".to_string()),
        url: format!("https://www.youtube.com/watch?v={video_id}"),
        author: snippet.channel_title.clone(),
        content_raw: snippet
            .description
            .as_deref()
            .map(|d| truncate_content(d, 2000)),
        thumbnail_url: snippet.best_thumbnail(),
        published_at: snippet.published_at.as_deref().and_then(parse_rfc3339),
        extra,
        ..Default::default()
    }
}

// --- Channel uploads ---

pub struct YouTubeChannelFetcher {
    channel_id: String,
    channel_handle: String,
    playlist_id: String,
    http: reqwest::Client,
    settings: Arc<Settings>,
}

impl YouTubeChannelFetcher {
    pub fn new(config: &serde_json::Value, deps: &FetcherDeps) -> Self {
        Self {
            channel_id: config_str(config, "channel_id"),
            channel_handle: config_str(config, "channel_handle"),
            playlist_id: config_str(config, "playlist_id"),
            http: deps.http.clone(),
            settings: deps.settings.clone(),
        }
    }

    async fn resolve_channel_id(&self, api_key: &str) -> Result<Option<String>> {
        if !self.channel_id.is_empty() {
            return Ok(Some(self.channel_id.clone()));
        }
        let handle = self.channel_handle.trim_start_matches('@');
        let resp: ChannelsResponse = self
            .http
            .get(format!("{YOUTUBE_API}/channels"))
            .query(&[
                ("part", "id,contentDetails"),
                ("forHandle", handle),
                ("key", api_key),
            ])
            .send()
            .await
            .context("youtube channels get")?
            .error_for_status()
            .context("youtube channels status")?
            .json()
            .await
            .context("youtube channels body")?;
        Ok(resp.items.into_iter().next().and_then(|c| c.id))
    }

    async fn uploads_playlist(&self, api_key: &str, channel_id: &str) -> Result<Option<String>> {
        if !self.playlist_id.is_empty() {
            return Ok(Some(self.playlist_id.clone()));
        }
        let resp: ChannelsResponse = self
            .http
            .get(format!("{YOUTUBE_API}/channels"))
            .query(&[
                ("part", "contentDetails"),
                ("id", channel_id),
                ("key", api_key),
            ])
            .send()
            .await
            .context("youtube channel details get")?
            .error_for_status()
            .context("youtube channel details status")?
            .json()
            .await
            .context("youtube channel details body")?;
        Ok(resp
            .items
            .into_iter()
            .next()
            .and_then(|c| c.content_details)
            .and_then(|d| d.related_playlists)
            .and_then(|p| p.uploads))
    }
}

#[async_trait]
impl Fetcher for YouTubeChannelFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        let api_key = self.settings.google_api_key.clone();
        if api_key.is_empty() {
            warn!("no Google API key configured, skipping youtube channel fetch");
            return Ok(Vec::new());
        }
        if self.channel_id.is_empty() && self.channel_handle.is_empty() {
            return Ok(Vec::new());
        }

        let Some(channel_id) = self.resolve_channel_id(&api_key).await? else {
            warn!(handle = %self.channel_handle, "could not resolve youtube handle");
            return Ok(Vec::new());
        };
        let Some(playlist_id) = self.uploads_playlist(&api_key, &channel_id).await? else {
            return Ok(Vec::new());
        };

        let resp: PlaylistItemsResponse = self
            .http
            .get(format!("{YOUTUBE_API}/playlistItems"))
            .query(&[
                ("part", "snippet"),
                ("playlistId", playlist_id.as_str()),
                ("maxResults", "10"),
                ("key", api_key.as_str()),
            ])
            .send()
            .await
            .context("youtube playlist get")?
            .error_for_status()
            .context("youtube playlist status")?
            .json()
            .await
            .context("youtube playlist body")?;

        let mut items = Vec::with_capacity(resp.items.len());
        for playlist_item in resp.items {
            let Some(snippet) = playlist_item.snippet else {
                continue;
            };
            let Some(video_id) = snippet.resource_id.as_ref().and_then(|r| r.video_id.clone())
            else {
                continue;
            };
            items.push(video_item(&snippet, &video_id, None));
        }
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "youtube_channel"
    }
}

// --- Keyword search ---

pub struct YouTubeSearchFetcher {
    keywords: Vec<String>,
    max_results: u64,
    min_views: u64,
    http: reqwest::Client,
    settings: Arc<Settings>,
}

impl YouTubeSearchFetcher {
    pub fn new(config: &serde_json::Value, deps: &FetcherDeps) -> Self {
        let keywords = config
            .get("keywords")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|k| k.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            keywords,
            max_results: config_u64(config, "max_results", 10),
            min_views: config_u64(config, "min_views", 3000),
            http: deps.http.clone(),
            settings: deps.settings.clone(),
        }
    }

    /// Batched statistics lookups, 50 video ids per call.
    async fn fetch_view_counts(
        &self,
        video_ids: &[String],
        api_key: &str,
    ) -> Result<HashMap<String, u64>> {
        let mut counts = HashMap::with_capacity(video_ids.len());
        for batch in video_ids.chunks(50) {
            let resp: VideosResponse = self
                .http
                .get(format!("{YOUTUBE_API}/videos"))
                .query(&[
                    ("part", "statistics"),
                    ("id", batch.join(",").as_str()),
                    ("key", api_key),
                ])
                .send()
                .await
                .context("youtube videos get")?
                .error_for_status()
                .context("youtube videos status")?
                .json()
                .await
                .context("youtube videos body")?;
            for video in resp.items {
                let views = video
                    .statistics
                    .and_then(|s| s.view_count)
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0);
                counts.insert(video.id, views);
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl Fetcher for YouTubeSearchFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        let api_key = self.settings.google_api_key.clone();
        if api_key.is_empty() {
            warn!("no Google API key configured, skipping youtube search");
            return Ok(Vec::new());
        }
        if self.keywords.is_empty() {
            return Ok(Vec::new());
        }

        let published_after = (Utc::now() - Duration::days(7))
            .format("%Y-%m-%dT00:00:00Z")
            .to_string();

        let mut all_items: Vec<RawItem> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        let max_results = self.max_results.to_string();
        for keyword in &self.keywords {
            let resp: SearchResponse = self
                .http
                .get(format!("{YOUTUBE_API}/search"))
                .query(&[
                    ("part", "snippet"),
                    ("q", keyword.as_str()),
                    ("type", "video"),
                    ("order", "date"),
                    ("maxResults", max_results.as_str()),
                    ("publishedAfter", published_after.as_str()),
                    ("videoDuration", "medium"),
                    ("relevanceLanguage", "en"),
                    ("key", api_key.as_str()),
                ])
                .send()
                .await
                .context("youtube search get")?
                .error_for_status()
                .context("youtube search status")?
                .json()
                .await
                .context("youtube search body")?;

            for result in resp.items {
                let Some(video_id) = result.id.and_then(|id| id.video_id) else {
                    continue;
                };
                if !seen_ids.insert(video_id.clone()) {
                    continue;
                }
                let snippet = result.snippet.unwrap_or_default();
                all_items.push(video_item(&snippet, &video_id, Some(keyword)));
            }
        }

        all_items.retain(|item| !NON_LATIN_RE.is_match(&item.title));

        if self.min_views > 0 && !all_items.is_empty() {
            let ids: Vec<String> = all_items
                .iter()
                .filter_map(|i| i.external_id.clone())
                .collect();
            let counts = self.fetch_view_counts(&ids, &api_key).await?;
            all_items.retain(|item| {
                item.external_id
                    .as_ref()
                    .and_then(|id| counts.get(id))
                    .copied()
                    .unwrap_or(0)
                    >= self.min_views
            });
        }

        Ok(all_items)
    }

    fn name(&self) -> &'static str {
        "youtube_search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_latin_titles_are_detected() {
        assert!(NON_LATIN_RE.is_match("Новости дня"));
        assert!(NON_LATIN_RE.is_match("日本語のタイトル"));
        assert!(!NON_LATIN_RE.is_match("Plain English title, with punctuation!"));
    }

    #[test]
    fn best_thumbnail_prefers_high() {
        let mut snippet = Snippet::default();
        snippet.thumbnails.insert(
            "default".into(),
            Thumbnail {
                url: Some("d".into()),
            },
        );
        snippet.thumbnails.insert(
            "high".into(),
            Thumbnail {
                url: Some("h".into()),
            },
        );
        assert_eq!(snippet.best_thumbnail().as_deref(), Some("h"));
    }
}
