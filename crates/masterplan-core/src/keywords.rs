//! Search keyword suggestions for a campaign brief.
//!
//! The model answers with a numbered list; only numbered lines are kept, so
//! headings and closing remarks around the list are ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::generate::{GenerationError, RetryPolicy, call_with_retry};
use crate::service::{GenerationRequest, GenerationService, Language};

/// Suggestions requested when the caller does not choose.
pub const DEFAULT_KEYWORD_COUNT: usize = 10;

static NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+[.)]\s*(?P<keyword>.+?)\s*$").expect("numbered line regex"));

pub fn build_keyword_prompt(prompt: &str, count: usize, language: Language) -> String {
    format!(
        "{}\n\nSuggest {} search keywords for this campaign: {}. \
         Answer with a numbered list, one keyword per line, with no other text.",
        language.instruction(),
        count,
        prompt.trim()
    )
}

/// Keywords from the numbered lines of `text`, in order, without
/// case-insensitive duplicates.
pub fn parse_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for line in text.lines() {
        let Some(keyword) = NUMBERED_LINE.captures(line).and_then(|caps| caps.name("keyword")) else {
            continue;
        };
        let keyword = keyword.as_str().trim_matches(|c| c == '"' || c == '*').trim();
        if keyword.is_empty() || keywords.iter().any(|k| k.to_lowercase() == keyword.to_lowercase()) {
            continue;
        }
        keywords.push(keyword.to_string());
    }
    keywords
}

/// Ask the service for up to `count` keywords.
pub async fn suggest_keywords(
    service: &dyn GenerationService,
    prompt: &str,
    count: usize,
    language: Language,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<String>, GenerationError> {
    let count = count.max(1);
    let request = GenerationRequest::text(build_keyword_prompt(prompt, count, language), language);
    let text = call_with_retry(service, &request, policy, cancel).await?;

    let mut keywords = parse_keywords(&text);
    keywords.truncate(count);
    if keywords.is_empty() {
        tracing::warn!("keyword response had no numbered lines");
    }
    Ok(keywords)
}
