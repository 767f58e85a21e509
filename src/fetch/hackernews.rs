// src/fetch/hackernews.rs
//! Hacker News adapter: top stories, pre-filtered for relevance against the
//! user's category taxonomy with a cheap LLM pass.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::warn;

use crate::config::Settings;
use crate::pipeline::summarizer::chat_completion;

use super::{Fetcher, FetcherDeps, RawItem};

const HN_TOP_STORIES: &str = "https://hacker-news.firebaseio.com/v0/topstories.json";
const HN_ITEM_URL: &str = "https://hacker-news.firebaseio.com/v0/item";
const HN_DISCUSSION_URL: &str = "https://news.ycombinator.com/item?id=";
const TOP_STORY_COUNT: usize = 30;

const FILTER_SYSTEM_PROMPT: &str = "You are a content relevance filter for a news \
    intelligence tool. Given news story titles and a set of user categories, identify \
    which stories are relevant to at least one category. Respond with valid JSON only.";

#[derive(Debug, Deserialize)]
struct HnStory {
    id: i64,
    title: Option<String>,
    url: Option<String>,
    by: Option<String>,
    time: Option<i64>,
    score: Option<i64>,
    descendants: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RelevanceResponse {
    #[serde(default)]
    relevant: Vec<RelevantEntry>,
}

#[derive(Debug, Deserialize)]
struct RelevantEntry {
    index: i64,
}

pub struct HackerNewsFetcher {
    min_score: i64,
    http: reqwest::Client,
    pool: PgPool,
    settings: Arc<Settings>,
}

impl HackerNewsFetcher {
    pub fn new(config: &serde_json::Value, deps: &FetcherDeps) -> Self {
        Self {
            min_score: config.get("min_score").and_then(|v| v.as_i64()).unwrap_or(0),
            http: deps.http.clone(),
            pool: deps.pool.clone(),
            settings: deps.settings.clone(),
        }
    }

    async fn fetch_stories(&self, ids: &[i64]) -> Vec<HnStory> {
        let fetches = ids.iter().map(|&id| {
            let http = self.http.clone();
            async move {
                let url = format!("{HN_ITEM_URL}/{id}.json");
                match http.get(&url).send().await {
                    Ok(resp) => resp.json::<Option<HnStory>>().await.ok().flatten(),
                    Err(e) => {
                        warn!(id, error = %e, "failed to fetch hn item");
                        None
                    }
                }
            }
        });
        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// LLM relevance pass over story titles. Falls back to "keep everything"
    /// when no categories exist, no key is configured, or the call fails.
    async fn filter_relevant(&self, stories: &[HnStory]) -> Vec<usize> {
        let all: Vec<usize> = (0..stories.len()).collect();

        let categories: Vec<(String, String)> = match sqlx::query_as(
            "SELECT slug, name FROM categories ORDER BY sort_order",
        )
        .fetch_all(&self.pool)
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "failed to load categories for hn filter");
                return all;
            }
        };
        if categories.is_empty() {
            return all;
        }
        if self.settings.openai_api_key.is_empty() {
            warn!("no OpenAI API key configured, returning all hn stories");
            return all;
        }

        let story_lines = stories
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{i}. {}", s.title.as_deref().unwrap_or("Untitled")))
            .collect::<Vec<_>>()
            .join("\n");
        let cat_lines = categories
            .iter()
            .map(|(slug, name)| format!("  - {slug}: {name}"))
            .collect::<Vec<_>>()
            .join("\n");

        let user_message = format!(
            "Here are the stories:\n{story_lines}\n\nHere are the categories:\n{cat_lines}\n\n\
             For each story that is relevant to at least one category, include it in the response.\n\
             Respond with JSON in this exact format:\n\
             {{\"relevant\": [{{\"index\": 0, \"categories\": [\"slug1\"]}}]}}\n\n\
             If no stories are relevant, respond with: {{\"relevant\": []}}"
        );

        let content = match chat_completion(
            &self.http,
            &self.settings.openai_api_key,
            &self.settings.openai_model,
            FILTER_SYSTEM_PROMPT,
            &user_message,
            0.2,
            true,
            None,
        )
        .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "hn relevance filter failed, returning all stories");
                return all;
            }
        };

        match serde_json::from_str::<RelevanceResponse>(&content) {
            Ok(parsed) => parsed
                .relevant
                .into_iter()
                .filter(|e| e.index >= 0)
                .map(|e| e.index as usize)
                .collect(),
            Err(e) => {
                warn!(error = %e, "unparseable hn relevance response, returning all stories");
                all
            }
        }
    }
}

#[async_trait]
impl Fetcher for HackerNewsFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        let ids: Vec<i64> = self
            .http
            .get(HN_TOP_STORIES)
            .send()
            .await
            .context("hn top stories get")?
            .error_for_status()
            .context("hn top stories status")?
            .json()
            .await
            .context("hn top stories body")?;

        let mut stories = self
            .fetch_stories(&ids[..ids.len().min(TOP_STORY_COUNT)])
            .await;

        if self.min_score > 0 {
            stories.retain(|s| s.score.unwrap_or(0) >= self.min_score);
        }
        if stories.is_empty() {
            return Ok(Vec::new());
        }

        let relevant = self.filter_relevant(&stories).await;

        let mut items = Vec::with_capacity(relevant.len());
        for idx in relevant {
            let Some(story) = stories.get(idx) else {
                continue;
            };
            let hn_url = format!("{HN_DISCUSSION_URL}{}", story.id);
            items.push(RawItem {
                external_id: Some(story.id.to_string()),
                title: story
                    .title
                    .clone()
                    .unwrap_or_else(|| "Untitled".to_string()),
                url: story.url.clone().unwrap_or_else(|| hn_url.clone()),
                author: story.by.clone(),
                published_at: story.time.and_then(|t| DateTime::from_timestamp(t, 0)),
                extra: json!({
                    "score": story.score,
                    "num_comments": story.descendants,
                    "hn_url": hn_url,
                }),
                ..Default::default()
            });
        }
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "hackernews"
    }
}
