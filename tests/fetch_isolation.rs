// tests/fetch_isolation.rs
//! Fan-out behavior of the fetch stage: one failing or hanging source must
//! never block or invalidate its siblings.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use signal_aggregator::fetch::{Fetcher, RawItem};
use signal_aggregator::models::SourceRow;
use signal_aggregator::pipeline::orchestrator::fetch_all;
use uuid::Uuid;

fn source(name: &str) -> SourceRow {
    SourceRow {
        id: Uuid::new_v4(),
        name: name.to_string(),
        source_type: "rss".to_string(),
        config: serde_json::json!({}),
        enabled: true,
        fetch_interval: "12 hours".to_string(),
        last_fetched_at: None,
        last_error: None,
        error_count: 0,
    }
}

struct StaticFetcher {
    count: usize,
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        Ok((0..self.count)
            .map(|i| RawItem {
                title: format!("Item {i}"),
                url: format!("https://static.example/{i}"),
                ..Default::default()
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

struct FailingFetcher;

#[async_trait]
impl Fetcher for FailingFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        Err(anyhow!("connection refused"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

struct HangingFetcher;

#[async_trait]
impl Fetcher for HangingFetcher {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}

#[tokio::test]
async fn one_failure_does_not_cancel_siblings() {
    let tasks: Vec<(SourceRow, Box<dyn Fetcher>)> = vec![
        (source("Alpha"), Box::new(StaticFetcher { count: 2 })),
        (source("Broken"), Box::new(FailingFetcher)),
        (source("Gamma"), Box::new(StaticFetcher { count: 3 })),
    ];

    let results = fetch_all(tasks, Duration::from_secs(5)).await;
    assert_eq!(results.len(), 3);

    let (_, alpha) = &results[0];
    assert_eq!(alpha.as_ref().unwrap().len(), 2);

    let (broken_source, broken) = &results[1];
    assert_eq!(broken_source.name, "Broken");
    assert!(broken.is_err());

    let (_, gamma) = &results[2];
    assert_eq!(gamma.as_ref().unwrap().len(), 3);

    let failures = results.iter().filter(|(_, r)| r.is_err()).count();
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn exceeding_the_deadline_yields_a_timeout_error_not_a_hang() {
    let tasks: Vec<(SourceRow, Box<dyn Fetcher>)> = vec![
        (source("Slow Feed"), Box::new(HangingFetcher)),
        (source("Fast"), Box::new(StaticFetcher { count: 1 })),
    ];

    let results = fetch_all(tasks, Duration::from_millis(100)).await;

    let (_, slow) = &results[0];
    let message = slow.as_ref().unwrap_err().to_string();
    assert!(
        message.contains("fetch timed out for source: Slow Feed"),
        "{message}"
    );

    let (_, fast) = &results[1];
    assert_eq!(fast.as_ref().unwrap().len(), 1);
}

#[tokio::test]
async fn results_preserve_input_order() {
    let tasks: Vec<(SourceRow, Box<dyn Fetcher>)> = vec![
        (source("One"), Box::new(StaticFetcher { count: 1 })),
        (source("Two"), Box::new(StaticFetcher { count: 2 })),
        (source("Three"), Box::new(StaticFetcher { count: 3 })),
    ];
    let results = fetch_all(tasks, Duration::from_secs(5)).await;
    let names: Vec<&str> = results.iter().map(|(s, _)| s.name.as_str()).collect();
    assert_eq!(names, vec!["One", "Two", "Three"]);
}
