// src/fetch/github.rs
//! GitHub release-feed adapter.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::config::Settings;

use super::{config_str, truncate_content, Fetcher, FetcherDeps, RawItem};

const MAX_RELEASES: usize = 20;

#[derive(Debug, Deserialize)]
struct Release {
    id: Option<i64>,
    name: Option<String>,
    tag_name: Option<String>,
    html_url: Option<String>,
    body: Option<String>,
    published_at: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    draft: bool,
    author: Option<ReleaseAuthor>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAuthor {
    login: Option<String>,
}

pub struct GitHubReleasesFetcher {
    owner: String,
    repo: String,
    http: reqwest::Client,
    settings: Arc<Settings>,
}

impl GitHubReleasesFetcher {
    pub fn new(config: &serde_json::Value, deps: &FetcherDeps) -> Self {
        Self {
            owner: config_str(config, "owner"),
            repo: config_str(config, "repo"),
            http: deps.http.clone(),
            settings: deps.settings.clone(),
        }
    }
}

#[async_trait]
impl Fetcher for GitHubReleasesFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        if self.owner.is_empty() || self.repo.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "https://api.github.com/repos/{}/{}/releases",
            self.owner, self.repo
        );
        let mut req = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .query(&[("per_page", MAX_RELEASES as u64)]);
        // Unauthenticated requests share a very small rate-limit bucket.
        if !self.settings.github_token.is_empty() {
            req = req.bearer_auth(&self.settings.github_token);
        }

        let releases: Vec<Release> = req
            .send()
            .await
            .context("github releases get")?
            .error_for_status()
            .context("github releases status")?
            .json()
            .await
            .context("github releases body")?;

        let mut items = Vec::with_capacity(releases.len().min(MAX_RELEASES));
        for release in releases.into_iter().take(MAX_RELEASES) {
            let label = release
                .name
                .filter(|n| !n.is_empty())
                .or_else(|| release.tag_name.clone())
                .unwrap_or_else(|| "Unknown".to_string());
            let published = release
                .published_at
                .or(release.created_at)
                .as_deref()
                .and_then(parse_rfc3339);

            items.push(RawItem {
                external_id: release.id.map(|id| id.to_string()),
                title: format!("{}/{}: {label}", self.owner, self.repo),
                url: release.html_url.unwrap_or_default(),
                author: release.author.and_then(|a| a.login),
                content_raw: release
                    .body
                    .as_deref()
                    .map(|b| truncate_content(b, 2000)),
                published_at: published,
                extra: json!({
                    "tag_name": release.tag_name,
                    "prerelease": release.prerelease,
                    "draft": release.draft,
                }),
                ..Default::default()
            });
        }
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "github_releases"
    }
}

pub(crate) fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_dates_parse_to_utc() {
        let dt = parse_rfc3339("2025-08-01T12:00:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-08-01T12:00:00+00:00");
        assert!(parse_rfc3339("yesterday").is_none());
    }
}
