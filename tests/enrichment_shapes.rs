// tests/enrichment_shapes.rs
//! Robustness of the summarizer response handling: confidence shapes,
//! missing fields, and malformed envelopes.

use signal_aggregator::pipeline::summarizer::{parse_results, SummaryResult};

#[test]
fn scalar_confidence_becomes_single_element_list() {
    let results = parse_results(
        r#"{"results": [{"index": 0, "summary": "s", "categories": ["tools"], "confidence": 0.9}]}"#,
    );
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].confidence.clone().into_vec(), vec![0.9]);
}

#[test]
fn list_confidence_is_preserved() {
    let results = parse_results(
        r#"{"results": [{"index": 1, "confidence": [0.7, 0.4, 0.2], "categories": ["a","b","c"]}]}"#,
    );
    assert_eq!(results[0].confidence.clone().into_vec(), vec![0.7, 0.4, 0.2]);
}

#[test]
fn garbage_confidence_becomes_empty_list() {
    let results = parse_results(
        r#"{"results": [{"index": 0, "confidence": {"weird": true}}]}"#,
    );
    assert!(results[0].confidence.clone().into_vec().is_empty());
}

#[test]
fn missing_fields_default_sanely() {
    let results = parse_results(r#"{"results": [{}]}"#);
    assert_eq!(results.len(), 1);
    let r: &SummaryResult = &results[0];
    assert_eq!(r.index, 0);
    assert!(r.summary.is_empty());
    assert!(r.categories.is_empty());
    assert!(r.confidence.clone().into_vec().is_empty());
}

#[test]
fn malformed_envelopes_yield_no_results() {
    assert!(parse_results("").is_empty());
    assert!(parse_results("I could not process that.").is_empty());
    assert!(parse_results(r#"{"results": "oops"}"#).is_empty());
}

#[test]
fn integer_confidence_is_accepted_as_scalar() {
    let results = parse_results(r#"{"results": [{"index": 0, "confidence": 1}]}"#);
    assert_eq!(results[0].confidence.clone().into_vec(), vec![1.0]);
}
