// src/pipeline/summarizer.rs
//! LLM-backed summarization and categorization.
//!
//! The summarizer never raises: with no API key configured, or on any
//! transport/parse failure, it returns an empty batch and the affected items
//! stay eligible for the next run.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = r#"You are a news summarizer for an AI/tech intelligence tool called Signal.

For each item, produce:
1. A concise 2-3 sentence summary focused on why this matters for AI practitioners and developers.
2. Assign 1-3 categories from this list (use slugs):
   - models-research: Papers, model releases, benchmarks, training techniques
   - coding-agents: AI coding tools, code generation, IDE agents, developer workflows
   - web-dev: Web development frameworks, frontend/backend tools, deployment
   - industry: Company news, funding, acquisitions, policy, regulations
   - tools: Developer tools, libraries, CLIs, productivity software
   - open-source: Open source releases, community projects, contributions
   - tutorials: How-tos, guides, educational content, learning resources
   - opinion: Think pieces, analysis, commentary, predictions

Respond with valid JSON only. Format:
{
  "results": [
    {"index": 0, "summary": "...", "categories": ["slug1"], "confidence": [0.95]}
  ]
}"#;

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRequest {
    pub index: usize,
    pub title: String,
    pub content: String,
}

/// The model sometimes returns a bare float for `confidence`; normalize all
/// shapes through [`Confidence::into_vec`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    Scalar(f64),
    List(Vec<f64>),
    Other(serde_json::Value),
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::List(Vec::new())
    }
}

impl Confidence {
    pub fn into_vec(self) -> Vec<f64> {
        match self {
            Confidence::Scalar(v) => vec![v],
            Confidence::List(v) => v,
            Confidence::Other(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SummaryResult {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub confidence: Confidence,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize a batch. An empty return means "no enrichment this round".
    async fn summarize(&self, items: &[SummaryRequest]) -> Vec<SummaryResult>;
}

pub struct OpenAiSummarizer {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
        }
    }

    fn build_user_message(items: &[SummaryRequest]) -> String {
        items
            .iter()
            .map(|item| {
                format!(
                    "[Item {}]\nTitle: {}\nContent: {}\n",
                    item.index, item.title, item.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, items: &[SummaryRequest]) -> Vec<SummaryResult> {
        if self.api_key.is_empty() {
            warn!("no OpenAI API key configured, skipping summarization");
            return Vec::new();
        }

        let user_message = Self::build_user_message(items);
        match chat_completion(
            &self.http,
            &self.api_key,
            &self.model,
            SYSTEM_PROMPT,
            &user_message,
            0.3,
            true,
            None,
        )
        .await
        {
            Ok(content) => parse_results(&content),
            Err(e) => {
                warn!(error = %e, "llm summarization failed");
                Vec::new()
            }
        }
    }
}

/// Parse the `{"results": [...]}` envelope; malformed content yields nothing.
pub fn parse_results(content: &str) -> Vec<SummaryResult> {
    #[derive(Deserialize)]
    struct Envelope {
        #[serde(default)]
        results: Vec<SummaryResult>,
    }
    match serde_json::from_str::<Envelope>(content) {
        Ok(envelope) => envelope.results,
        Err(e) => {
            warn!(error = %e, "unparseable summarizer response");
            Vec::new()
        }
    }
}

/// One chat-completions call. Shared by the summarizer, the Hacker News
/// relevance filter, and the weekly review generator.
#[allow(clippy::too_many_arguments)]
pub async fn chat_completion(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    json_mode: bool,
    max_tokens: Option<u32>,
) -> Result<String> {
    #[derive(Deserialize)]
    struct Resp {
        choices: Vec<Choice>,
    }
    #[derive(Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }
    #[derive(Deserialize)]
    struct ChoiceMessage {
        content: Option<String>,
    }

    let mut body = json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
        "temperature": temperature,
    });
    if json_mode {
        body["response_format"] = json!({"type": "json_object"});
    }
    if let Some(max_tokens) = max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    let resp = http
        .post(OPENAI_CHAT_URL)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .context("chat completion request")?
        .error_for_status()
        .context("chat completion status")?;

    let parsed: Resp = resp.json().await.context("chat completion body")?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow!("chat completion returned no content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_confidence_normalizes_to_single_element_list() {
        let result: SummaryResult =
            serde_json::from_str(r#"{"index": 0, "summary": "s", "confidence": 0.9}"#).unwrap();
        assert_eq!(result.confidence.into_vec(), vec![0.9]);
    }

    #[test]
    fn list_confidence_passes_through() {
        let result: SummaryResult =
            serde_json::from_str(r#"{"index": 0, "confidence": [0.8, 0.6]}"#).unwrap();
        assert_eq!(result.confidence.into_vec(), vec![0.8, 0.6]);
    }

    #[test]
    fn other_confidence_shapes_normalize_to_empty() {
        let result: SummaryResult =
            serde_json::from_str(r#"{"index": 0, "confidence": "high"}"#).unwrap();
        assert!(result.confidence.into_vec().is_empty());

        let result: SummaryResult = serde_json::from_str(r#"{"index": 0}"#).unwrap();
        assert!(result.confidence.into_vec().is_empty());
    }

    #[test]
    fn parses_result_envelope() {
        let content = r#"{"results": [
            {"index": 0, "summary": "A summary.", "categories": ["tools"], "confidence": [0.95]},
            {"index": 1, "summary": "", "categories": []}
        ]}"#;
        let results = parse_results(content);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].categories, vec!["tools"]);
        assert!(results[1].summary.is_empty());
    }

    #[test]
    fn malformed_envelope_yields_nothing() {
        assert!(parse_results("not json at all").is_empty());
        assert!(parse_results(r#"{"unexpected": true}"#).is_empty());
    }

    #[test]
    fn user_message_joins_batch_items() {
        let message = OpenAiSummarizer::build_user_message(&[
            SummaryRequest {
                index: 0,
                title: "First".into(),
                content: "one".into(),
            },
            SummaryRequest {
                index: 1,
                title: "Second".into(),
                content: "two".into(),
            },
        ]);
        assert!(message.contains("[Item 0]\nTitle: First"));
        assert!(message.contains("\n---\n[Item 1]"));
    }
}
