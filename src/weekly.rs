// src/weekly.rs
//! Weekly review generation from starred items.

use anyhow::Result;
use chrono::NaiveDate;
use tracing::warn;

use crate::config::Settings;
use crate::pipeline::summarizer::chat_completion;

const REVIEW_SYSTEM_PROMPT: &str = "You are a technical writer generating a weekly AI \
intelligence review for a Field CTO at a cloud platform company.\n\n\
Given a list of starred/curated items grouped by category, generate a structured \
markdown review with:\n\n\
1. **Executive Summary** (3-5 sentences): High-level overview of the week's key themes.\n\
2. **Key Developments** (grouped by category): For each category with items, write a \
subsection with bullet points summarizing each item. Include the original URL as a \
markdown link. If the curator left a note, incorporate its insight.\n\
3. **Trends to Watch**: 2-4 emerging patterns or themes you notice across the items.\n\
4. **Action Items**: 2-3 concrete next steps based on the developments (as a checklist).\n\n\
Tone: Professional but not stuffy. Informed, opinionated, concise. This is for an \
internal team briefing, not a blog post.\n\n\
Output clean markdown only, no code fences wrapping the output.";

#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub source_name: String,
    pub star_note: String,
    pub categories: Vec<String>,
}

impl ReviewItem {
    fn first_category(&self) -> &str {
        self.categories
            .first()
            .map(String::as_str)
            .unwrap_or("Uncategorized")
    }
}

/// Generate the review markdown, via LLM when a key is configured and
/// falling back to a plain rendering otherwise.
pub async fn generate_weekly_review(
    http: &reqwest::Client,
    settings: &Settings,
    items: &[ReviewItem],
    week_start: NaiveDate,
    week_end: NaiveDate,
    title: &str,
) -> Result<String> {
    if settings.openai_api_key.is_empty() {
        return Ok(fallback_review(items, title));
    }

    let mut user_content = format!("# Items for review: {week_start} to {week_end}\n\n");
    user_content.push_str(&format!("Title: {title}\n"));
    user_content.push_str(&format!("Total items: {}\n\n", items.len()));

    for item in items {
        user_content.push_str(&format!("### [{}] {}\n", item.first_category(), item.title));
        user_content.push_str(&format!("- URL: {}\n", item.url));
        user_content.push_str(&format!("- Source: {}\n", item.source_name));
        if !item.summary.is_empty() {
            user_content.push_str(&format!("- Summary: {}\n", item.summary));
        }
        if !item.star_note.is_empty() {
            user_content.push_str(&format!("- Curator note: {}\n", item.star_note));
        }
        user_content.push('\n');
    }

    match chat_completion(
        http,
        &settings.openai_api_key,
        &settings.openai_model,
        REVIEW_SYSTEM_PROMPT,
        &user_content,
        0.4,
        false,
        Some(4000),
    )
    .await
    {
        Ok(markdown) => {
            let heading = format!("# {title}");
            if markdown.starts_with(&heading) {
                Ok(markdown)
            } else {
                Ok(format!("{heading}\n\n{markdown}"))
            }
        }
        Err(e) => {
            warn!(error = %e, "weekly review generation failed, using fallback");
            Ok(fallback_review(items, title))
        }
    }
}

/// Plain markdown rendering, grouped by each item's first category.
pub fn fallback_review(items: &[ReviewItem], title: &str) -> String {
    let mut lines = vec![format!("# {title}"), String::new()];
    lines.push("## Key Developments".to_string());
    lines.push(String::new());

    let mut categorized: Vec<(&str, Vec<&ReviewItem>)> = Vec::new();
    for item in items {
        let cat = item.first_category();
        match categorized.iter_mut().find(|(c, _)| *c == cat) {
            Some((_, bucket)) => bucket.push(item),
            None => categorized.push((cat, vec![item])),
        }
    }

    for (category, cat_items) in categorized {
        lines.push(format!("### {category}"));
        lines.push(String::new());
        for item in cat_items {
            lines.push(format!(
                "- **[{}]({})** ({})",
                item.title, item.url, item.source_name
            ));
            if !item.summary.is_empty() {
                lines.push(format!("  {}", item.summary));
            }
            if !item.star_note.is_empty() {
                lines.push(format!("  > *{}*", item.star_note));
            }
        }
        lines.push(String::new());
    }

    lines.push("---".to_string());
    lines.push(format!("*Generated from {} starred items*", items.len()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, category: &str, note: &str) -> ReviewItem {
        ReviewItem {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            summary: String::new(),
            source_name: "Example".to_string(),
            star_note: note.to_string(),
            categories: vec![category.to_string()],
        }
    }

    #[test]
    fn fallback_groups_by_first_category() {
        let items = vec![
            item("One", "Tools", ""),
            item("Two", "Industry", "worth a deeper look"),
            item("Three", "Tools", ""),
        ];
        let markdown = fallback_review(&items, "Week 32");
        assert!(markdown.starts_with("# Week 32"));
        assert!(markdown.contains("### Tools"));
        assert!(markdown.contains("### Industry"));
        assert!(markdown.contains("> *worth a deeper look*"));
        assert!(markdown.ends_with("*Generated from 3 starred items*"));
    }

    #[test]
    fn items_without_categories_fall_back_to_uncategorized() {
        let mut orphan = item("Orphan", "x", "");
        orphan.categories.clear();
        let markdown = fallback_review(&[orphan], "W");
        assert!(markdown.contains("### Uncategorized"));
    }
}
