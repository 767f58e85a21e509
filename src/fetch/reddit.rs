// src/fetch/reddit.rs
//! Subreddit listing adapter via the public JSON endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::json;

use super::{config_str, config_u64, truncate_content, Fetcher, FetcherDeps, RawItem};

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    data: ListingData,
}

#[derive(Debug, Deserialize, Default)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    #[serde(default)]
    data: Post,
}

#[derive(Debug, Deserialize, Default)]
struct Post {
    id: Option<String>,
    title: Option<String>,
    author: Option<String>,
    selftext: Option<String>,
    url: Option<String>,
    permalink: Option<String>,
    thumbnail: Option<String>,
    created_utc: Option<f64>,
    score: Option<i64>,
    num_comments: Option<i64>,
}

pub struct RedditFetcher {
    subreddit: String,
    sort: String,
    limit: u64,
    http: reqwest::Client,
}

impl RedditFetcher {
    pub fn new(config: &serde_json::Value, deps: &FetcherDeps) -> Self {
        let sort = {
            let s = config_str(config, "sort");
            if s.is_empty() {
                "hot".to_string()
            } else {
                s
            }
        };
        Self {
            subreddit: config_str(config, "subreddit"),
            sort,
            limit: config_u64(config, "limit", 25).min(100),
            http: deps.http.clone(),
        }
    }
}

#[async_trait]
impl Fetcher for RedditFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        if self.subreddit.is_empty() {
            return Ok(Vec::new());
        }

        // old.reddit.com tolerates anonymous JSON clients far better.
        let url = format!(
            "https://old.reddit.com/r/{}/{}.json",
            self.subreddit, self.sort
        );
        let listing: Listing = self
            .http
            .get(&url)
            .query(&[("limit", self.limit)])
            .send()
            .await
            .context("reddit http get")?
            .error_for_status()
            .context("reddit http status")?
            .json()
            .await
            .context("reddit listing body")?;

        let mut items = Vec::with_capacity(listing.data.children.len());
        for child in listing.data.children {
            let post = child.data;
            let permalink = post.permalink.unwrap_or_default();
            let reddit_url = format!("https://reddit.com{permalink}");
            let post_url = post
                .url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| reddit_url.clone());
            let title = post.title.unwrap_or_else(|| "Untitled".to_string());
            let content = post.selftext.filter(|t| !t.is_empty());

            items.push(RawItem {
                external_id: post.id,
                title: title.clone(),
                url: post_url,
                author: post.author,
                content_raw: Some(truncate_content(content.as_deref().unwrap_or(&title), 2000)),
                thumbnail_url: post.thumbnail.filter(|t| t.starts_with("http")),
                published_at: post
                    .created_utc
                    .and_then(|t| DateTime::from_timestamp(t as i64, 0)),
                extra: json!({
                    "score": post.score,
                    "num_comments": post.num_comments,
                    "subreddit": self.subreddit,
                    "reddit_url": reddit_url,
                }),
                ..Default::default()
            });
        }
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}
