// src/fetch/rss.rs
//! Generic RSS 2.0 / Atom-over-RSS feed adapter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;

use super::{config_str, truncate_content, Fetcher, FetcherDeps, RawItem};

/// Feeds routinely exceed this; anything older than the first 50 entries is
/// noise for a twice-daily pipeline.
const MAX_ENTRIES: usize = 50;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    author: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

pub(crate) fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an RSS 2.0 document into candidate items. Shared with the Nitter
/// adapter, which serves plain RSS.
pub fn parse_feed(xml: &str) -> Result<Vec<RawItem>> {
    let xml = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml).context("parsing rss xml")?;

    let mut out = Vec::with_capacity(rss.channel.item.len().min(MAX_ENTRIES));
    for entry in rss.channel.item.into_iter().take(MAX_ENTRIES) {
        let url = entry.link.unwrap_or_default();
        out.push(RawItem {
            external_id: entry.guid.or_else(|| {
                if url.is_empty() {
                    None
                } else {
                    Some(url.clone())
                }
            }),
            title: entry.title.unwrap_or_else(|| "Untitled".to_string()),
            url,
            author: entry.author,
            content_raw: entry
                .description
                .as_deref()
                .map(|d| truncate_content(d, 2000)),
            published_at: entry.pub_date.as_deref().and_then(parse_rfc2822),
            ..Default::default()
        });
    }
    Ok(out)
}

/// Feeds in the wild embed bare HTML entities that are invalid XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

pub struct RssFetcher {
    feed_url: String,
    http: reqwest::Client,
}

impl RssFetcher {
    pub fn new(config: &serde_json::Value, deps: &FetcherDeps) -> Self {
        Self {
            feed_url: config_str(config, "feed_url"),
            http: deps.http.clone(),
        }
    }
}

#[async_trait]
impl Fetcher for RssFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        if self.feed_url.is_empty() {
            return Ok(Vec::new());
        }

        let body = self
            .http
            .get(&self.feed_url)
            .send()
            .await
            .context("rss http get")?
            .error_for_status()
            .context("rss http status")?
            .text()
            .await
            .context("rss http body")?;

        parse_feed(&body)
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc2822_dates_parse_to_utc() {
        let dt = parse_rfc2822("Tue, 05 Aug 2025 14:30:00 +0200").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-08-05T12:30:00+00:00");
        assert!(parse_rfc2822("not a date").is_none());
    }

    #[test]
    fn parses_minimal_feed() {
        let xml = r#"<?xml version="1.0"?>
            <rss version="2.0"><channel>
              <title>Example</title>
              <item>
                <title>First post</title>
                <link>https://example.com/1</link>
                <guid>ex-1</guid>
                <pubDate>Mon, 04 Aug 2025 09:00:00 GMT</pubDate>
                <description>Hello &nbsp; world</description>
              </item>
              <item>
                <title>No link</title>
              </item>
            </channel></rss>"#;
        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].external_id.as_deref(), Some("ex-1"));
        assert_eq!(items[0].url, "https://example.com/1");
        assert!(items[0].published_at.is_some());
        assert_eq!(items[1].title, "No link");
        assert!(items[1].url.is_empty());
        assert!(items[1].external_id.is_none());
    }
}
