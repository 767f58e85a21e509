// src/fetch/bluesky.rs
//! Bluesky adapter over the unauthenticated public XRPC endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::github::parse_rfc3339;
use super::{config_str, truncate_content, Fetcher, FetcherDeps, RawItem};

const BSKY_PUBLIC_API: &str = "https://public.api.bsky.app/xrpc";
const FEED_LIMIT: u32 = 30;
const TITLE_CHARS: usize = 120;

#[derive(Debug, Deserialize)]
struct ResolveHandleResponse {
    #[serde(default)]
    did: String,
}

#[derive(Debug, Deserialize)]
struct AuthorFeedResponse {
    #[serde(default)]
    feed: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    post: Option<Post>,
}

#[derive(Debug, Deserialize, Default)]
struct Post {
    uri: Option<String>,
    record: Option<PostRecord>,
    author: Option<Author>,
    embed: Option<Embed>,
    #[serde(rename = "likeCount", default)]
    like_count: i64,
    #[serde(rename = "repostCount", default)]
    repost_count: i64,
    #[serde(rename = "replyCount", default)]
    reply_count: i64,
}

#[derive(Debug, Deserialize)]
struct PostRecord {
    text: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    handle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Embed {
    #[serde(rename = "$type")]
    kind: Option<String>,
    external: Option<EmbedExternal>,
    #[serde(default)]
    images: Vec<EmbedImage>,
}

#[derive(Debug, Deserialize)]
struct EmbedExternal {
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedImage {
    thumb: Option<String>,
}

pub struct BlueskyFetcher {
    handle: String,
    http: reqwest::Client,
}

impl BlueskyFetcher {
    pub fn new(config: &serde_json::Value, deps: &FetcherDeps) -> Self {
        Self {
            handle: config_str(config, "handle"),
            http: deps.http.clone(),
        }
    }
}

#[async_trait]
impl Fetcher for BlueskyFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        if self.handle.is_empty() {
            return Ok(Vec::new());
        }

        let resolved: ResolveHandleResponse = self
            .http
            .get(format!(
                "{BSKY_PUBLIC_API}/com.atproto.identity.resolveHandle"
            ))
            .query(&[("handle", self.handle.as_str())])
            .send()
            .await
            .context("bluesky resolve handle get")?
            .error_for_status()
            .context("bluesky resolve handle status")?
            .json()
            .await
            .context("bluesky resolve handle body")?;

        if resolved.did.is_empty() {
            warn!(handle = %self.handle, "could not resolve bluesky handle");
            return Ok(Vec::new());
        }

        let limit = FEED_LIMIT.to_string();
        let feed: AuthorFeedResponse = self
            .http
            .get(format!("{BSKY_PUBLIC_API}/app.bsky.feed.getAuthorFeed"))
            .query(&[
                ("actor", resolved.did.as_str()),
                ("limit", limit.as_str()),
                ("filter", "posts_no_replies"),
            ])
            .send()
            .await
            .context("bluesky author feed get")?
            .error_for_status()
            .context("bluesky author feed status")?
            .json()
            .await
            .context("bluesky author feed body")?;

        let mut items = Vec::with_capacity(feed.feed.len());
        for feed_item in feed.feed {
            let post = feed_item.post.unwrap_or_default();
            let record = post.record;
            let Some(text) = record
                .as_ref()
                .and_then(|r| r.text.clone())
                .filter(|t| !t.is_empty())
            else {
                continue;
            };

            let uri = post.uri.unwrap_or_default();
            let rkey = uri.rsplit('/').next().unwrap_or_default();
            let post_url = if rkey.is_empty() {
                String::new()
            } else {
                format!("https://bsky.app/profile/{}/post/{rkey}", self.handle)
            };

            let (external_url, thumbnail) = match &post.embed {
                Some(embed) if embed.kind.as_deref() == Some("app.bsky.embed.external#view") => (
                    embed
                        .external
                        .as_ref()
                        .and_then(|e| e.uri.clone())
                        .unwrap_or_default(),
                    None,
                ),
                Some(embed) if embed.kind.as_deref() == Some("app.bsky.embed.images#view") => (
                    String::new(),
                    embed.images.first().and_then(|i| i.thumb.clone()),
                ),
                _ => (String::new(), None),
            };

            let mut title: String = text.chars().take(TITLE_CHARS).collect();
            if text.chars().count() > TITLE_CHARS {
                title.push_str("...");
            }

            items.push(RawItem {
                external_id: Some(uri),
                title,
                url: if external_url.is_empty() {
                    post_url.clone()
                } else {
                    external_url
                },
                author: post.author.and_then(|a| a.display_name.or(a.handle)),
                content_raw: Some(truncate_content(&text, 2000)),
                thumbnail_url: thumbnail,
                published_at: record
                    .as_ref()
                    .and_then(|r| r.created_at.as_deref())
                    .and_then(parse_rfc3339),
                extra: json!({
                    "bsky_url": post_url,
                    "like_count": post.like_count,
                    "repost_count": post.repost_count,
                    "reply_count": post.reply_count,
                    "handle": self.handle,
                }),
                ..Default::default()
            });
        }
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "bluesky"
    }
}
