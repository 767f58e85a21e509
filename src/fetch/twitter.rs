// src/fetch/twitter.rs
//! Twitter adapter via Nitter RSS fallback. Fragile: public instances rotate
//! and shut down regularly, so we walk a candidate list until one answers.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::rss::parse_feed;
use super::{config_str, Fetcher, FetcherDeps, RawItem};

const NITTER_INSTANCES: &[&str] = &[
    "https://nitter.privacydev.net",
    "https://nitter.poast.org",
    "https://nitter.woodland.cafe",
    "https://nitter.1d4.us",
];

const PER_INSTANCE_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_TWEETS: usize = 30;

pub struct TwitterFetcher {
    username: String,
    http: reqwest::Client,
}

impl TwitterFetcher {
    pub fn new(config: &serde_json::Value, deps: &FetcherDeps) -> Self {
        Self {
            username: config_str(config, "username"),
            http: deps.http.clone(),
        }
    }
}

/// Rewrite a Nitter link back to twitter.com.
fn to_twitter_url(link: &str) -> String {
    for instance in NITTER_INSTANCES {
        if let Some(rest) = link.strip_prefix(instance) {
            return format!("https://twitter.com{rest}");
        }
    }
    link.to_string()
}

#[async_trait]
impl Fetcher for TwitterFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        if self.username.is_empty() {
            return Ok(Vec::new());
        }

        let mut rss_content = None;
        let mut last_error = None;

        for instance in NITTER_INSTANCES {
            let url = format!("{instance}/{}/rss", self.username);
            match self
                .http
                .get(&url)
                .timeout(PER_INSTANCE_TIMEOUT)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(body) if body.len() > 100 => {
                        rss_content = Some(body);
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        last_error = Some(e.to_string());
                        continue;
                    }
                },
                Ok(_) => continue,
                Err(e) => {
                    last_error = Some(e.to_string());
                    continue;
                }
            }
        }

        let Some(rss_content) = rss_content else {
            warn!(
                username = %self.username,
                error = last_error.as_deref().unwrap_or("no instance responded"),
                "all nitter instances failed"
            );
            return Ok(Vec::new());
        };

        let parsed = parse_feed(&rss_content)?;
        let mut items = Vec::with_capacity(parsed.len().min(MAX_TWEETS));
        for mut item in parsed.into_iter().take(MAX_TWEETS) {
            let tweet_url = to_twitter_url(&item.url);
            if item.title.is_empty() {
                item.title = item
                    .content_raw
                    .as_deref()
                    .map(|c| c.chars().take(120).collect())
                    .filter(|t: &String| !t.is_empty())
                    .unwrap_or_else(|| format!("Tweet by @{}", self.username));
            }
            item.external_id = Some(tweet_url.clone());
            item.url = tweet_url;
            item.author = Some(format!("@{}", self.username));
            item.extra = json!({"username": self.username, "method": "nitter"});
            items.push(item);
        }
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "twitter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nitter_links_are_rewritten() {
        assert_eq!(
            to_twitter_url("https://nitter.poast.org/someone/status/1"),
            "https://twitter.com/someone/status/1"
        );
        assert_eq!(
            to_twitter_url("https://twitter.com/someone/status/1"),
            "https://twitter.com/someone/status/1"
        );
    }
}
