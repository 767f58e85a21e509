// src/fetch/arxiv.rs
//! arXiv Atom query adapter, newest submissions first.

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use serde_json::json;

use super::github::parse_rfc3339;
use super::{config_u64, truncate_content, Fetcher, FetcherDeps, RawItem};

const ARXIV_API: &str = "https://export.arxiv.org/api/query";

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@type")]
    link_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

/// Parse an arXiv Atom response into candidate items.
pub fn parse_atom(xml: &str) -> Result<Vec<RawItem>> {
    let feed: AtomFeed = from_str(xml).context("parsing arxiv atom xml")?;

    let mut out = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let abs_url = entry.id.unwrap_or_default();
        let arxiv_id = abs_url
            .rsplit("/abs/")
            .next()
            .unwrap_or_default()
            .to_string();

        let names: Vec<String> = entry.authors.into_iter().filter_map(|a| a.name).collect();
        let mut author = names
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if names.len() > 5 {
            author.push_str(&format!(" et al. ({} authors)", names.len()));
        }

        let pdf_url = entry
            .links
            .iter()
            .find(|l| l.link_type.as_deref() == Some("application/pdf"))
            .and_then(|l| l.href.clone())
            .unwrap_or_default();

        // Abstracts arrive with hard-wrapped whitespace.
        let summary = entry
            .summary
            .as_deref()
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();

        out.push(RawItem {
            external_id: if arxiv_id.is_empty() {
                None
            } else {
                Some(arxiv_id.clone())
            },
            title: entry
                .title
                .as_deref()
                .map(|t| t.replace('\n', " ").trim().to_string())
                .unwrap_or_else(|| "Untitled".to_string()),
            url: abs_url,
            author: if author.is_empty() { None } else { Some(author) },
            content_raw: Some(truncate_content(&summary, 2000)),
            published_at: entry.published.as_deref().and_then(parse_rfc3339),
            extra: json!({
                "arxiv_id": arxiv_id,
                "pdf_url": pdf_url,
                "categories": entry
                    .categories
                    .iter()
                    .filter_map(|c| c.term.clone())
                    .collect::<Vec<_>>(),
            }),
            ..Default::default()
        });
    }
    Ok(out)
}

pub struct ArxivFetcher {
    categories: Vec<String>,
    max_results: u64,
    http: reqwest::Client,
}

impl ArxivFetcher {
    pub fn new(config: &serde_json::Value, deps: &FetcherDeps) -> Self {
        let categories = config
            .get("categories")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect::<Vec<_>>()
            })
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| vec!["cs.AI".to_string()]);
        Self {
            categories,
            max_results: config_u64(config, "max_results", 20),
            http: deps.http.clone(),
        }
    }
}

#[async_trait]
impl Fetcher for ArxivFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        let cat_query = self
            .categories
            .iter()
            .map(|c| format!("cat:{c}"))
            .collect::<Vec<_>>()
            .join(" OR ");

        let max_results = self.max_results.to_string();
        let body = self
            .http
            .get(ARXIV_API)
            .query(&[
                ("search_query", cat_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .context("arxiv http get")?
            .error_for_status()
            .context("arxiv http status")?
            .text()
            .await
            .context("arxiv http body")?;

        let mut items = parse_atom(&body)?;
        items.truncate(self.max_results as usize);
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "arxiv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_atom_entry() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <feed xmlns="http://www.w3.org/2005/Atom">
              <entry>
                <id>http://arxiv.org/abs/2508.01234v1</id>
                <title>A Study of
  Things</title>
                <summary>  Lots   of
   whitespace here.  </summary>
                <published>2025-08-01T00:00:00Z</published>
                <author><name>Ada Lovelace</name></author>
                <author><name>Alan Turing</name></author>
                <link href="http://arxiv.org/pdf/2508.01234v1" type="application/pdf"/>
                <category term="cs.AI"/>
              </entry>
            </feed>"#;
        let items = parse_atom(xml).unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.external_id.as_deref(), Some("2508.01234v1"));
        assert_eq!(item.author.as_deref(), Some("Ada Lovelace, Alan Turing"));
        assert_eq!(
            item.content_raw.as_deref(),
            Some("Lots of whitespace here.")
        );
        assert_eq!(item.extra["pdf_url"], "http://arxiv.org/pdf/2508.01234v1");
        assert_eq!(item.extra["categories"][0], "cs.AI");
    }

    #[test]
    fn condenses_long_author_lists() {
        let entry_authors = (0..7)
            .map(|i| format!("<author><name>Author {i}</name></author>"))
            .collect::<String>();
        let xml = format!(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
                <id>http://arxiv.org/abs/2508.9v1</id>
                <title>T</title>{entry_authors}
               </entry></feed>"#
        );
        let items = parse_atom(&xml).unwrap();
        let author = items[0].author.as_deref().unwrap();
        assert!(author.ends_with("et al. (7 authors)"), "{author}");
    }
}
