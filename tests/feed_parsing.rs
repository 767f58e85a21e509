// tests/feed_parsing.rs
use signal_aggregator::fetch::rss::parse_feed;

#[test]
fn fixture_feed_parses_fully() {
    let xml = include_str!("fixtures/sample_rss.xml");
    let items = parse_feed(xml).unwrap();
    assert_eq!(items.len(), 3);

    let first = &items[0];
    assert_eq!(first.title, "Scaling our ingestion pipeline");
    assert_eq!(first.url, "https://blog.example.com/posts/scaling-ingestion");
    assert_eq!(first.author.as_deref(), Some("jane@example.com"));
    assert!(first.published_at.is_some());
    assert!(first
        .content_raw
        .as_deref()
        .unwrap()
        .contains("lessons learned"));

    // guid wins over link for the external id.
    assert_eq!(items[1].external_id.as_deref(), Some("pg-tips-2025"));

    // Entries without link/date still come through as candidates.
    let bare = &items[2];
    assert!(bare.url.is_empty());
    assert!(bare.published_at.is_none());
    assert!(bare.external_id.is_none());
}

#[test]
fn empty_channel_yields_no_items() {
    let xml = r#"<rss version="2.0"><channel><title>Empty</title></channel></rss>"#;
    assert!(parse_feed(xml).unwrap().is_empty());
}

#[test]
fn invalid_xml_is_an_error() {
    assert!(parse_feed("<rss><channel><item>").is_err());
}
