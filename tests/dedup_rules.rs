// tests/dedup_rules.rs
use std::collections::HashSet;

use signal_aggregator::fetch::RawItem;
use signal_aggregator::pipeline::dedup::{
    partition_new, title_similarity, TITLE_SIMILARITY_THRESHOLD,
};
use signal_aggregator::pipeline::Candidate;
use uuid::Uuid;

fn candidate(title: &str, url: &str) -> Candidate {
    Candidate {
        source_id: Uuid::nil(),
        item: RawItem {
            title: title.into(),
            url: url.into(),
            ..Default::default()
        },
    }
}

#[test]
fn ratio_is_one_for_identical_titles_and_low_for_unrelated() {
    assert_eq!(title_similarity("Hello World", "Hello World"), 1.0);
    assert!(title_similarity("Hello World", "Goodbye") < TITLE_SIMILARITY_THRESHOLD);
}

#[test]
fn extended_title_still_matches() {
    let ratio = title_similarity(
        "Introducing GPT-5: A New Frontier",
        "Introducing GPT-5: A New Frontier in AI",
    );
    assert!(ratio >= TITLE_SIMILARITY_THRESHOLD, "ratio = {ratio}");
}

#[test]
fn five_candidates_two_stored_urls_one_near_duplicate_yields_two() {
    let existing_urls: HashSet<String> = [
        "https://news.example/a".to_string(),
        "https://news.example/b".to_string(),
    ]
    .into_iter()
    .collect();
    let recent_titles = vec!["Introducing GPT-5: A New Frontier".to_string()];

    let kept = partition_new(
        vec![
            candidate("Anything", "https://news.example/a"),
            candidate("Else", "https://news.example/b"),
            candidate(
                "Introducing GPT-5: A New Frontier in AI",
                "https://news.example/c",
            ),
            candidate("Tokio 2.0 roadmap", "https://news.example/d"),
            candidate("New sqlx release", "https://news.example/e"),
        ],
        existing_urls,
        recent_titles,
    );

    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].item.title, "Tokio 2.0 roadmap");
    assert_eq!(kept[1].item.title, "New sqlx release");
}

#[test]
fn identical_urls_within_one_batch_keep_first_only() {
    let kept = partition_new(
        vec![
            candidate("From source one", "https://news.example/shared"),
            candidate("Totally different headline", "https://news.example/shared"),
        ],
        HashSet::new(),
        Vec::new(),
    );
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].item.title, "From source one");
}

#[test]
fn cross_source_near_duplicates_within_one_batch_are_suppressed() {
    // The same story surfaced by two feeds with slightly different titles.
    let kept = partition_new(
        vec![
            candidate(
                "Anthropic ships new agent tooling",
                "https://one.example/story",
            ),
            candidate(
                "Anthropic ships new agent tooling today",
                "https://two.example/story",
            ),
        ],
        HashSet::new(),
        Vec::new(),
    );
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].item.url, "https://one.example/story");
}

#[test]
fn urlless_candidates_fall_through_to_title_layer() {
    let existing_urls: HashSet<String> = ["https://news.example/a".to_string()]
        .into_iter()
        .collect();
    let kept = partition_new(
        vec![candidate("A headline without a link", "")],
        existing_urls,
        vec!["Completely unrelated".to_string()],
    );
    assert_eq!(kept.len(), 1);
}
