//! Creative concepts: short ad-image descriptions per aspect ratio.
//!
//! One request per ratio, all in flight at once. Each request has its own
//! retry loop, and one ratio failing does not affect the others.

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::generate::{GenerationError, RetryPolicy, call_with_retry};
use crate::service::{GenerationRequest, GenerationService, Language};

/// Ratios requested when the caller does not choose.
pub const DEFAULT_ASPECT_RATIOS: [&str; 4] = ["1:1", "9:16", "16:9", "4:5"];

/// Concepts kept per ratio.
pub const CONCEPTS_PER_RATIO: usize = 3;

/// Concepts for one aspect ratio, or why there are none.
#[derive(Debug)]
pub struct CreativeResult {
    pub aspect_ratio: String,
    pub concepts: Result<Vec<String>, GenerationError>,
}

pub fn build_creative_prompt(prompt: &str, aspect_ratio: &str, language: Language) -> String {
    format!(
        "{}\n\nGenerate creative image descriptions for: {}. Aspect ratio: {}. \
         Provide {} different creative concepts, one per line, with no other text.",
        language.instruction(),
        prompt.trim(),
        aspect_ratio,
        CONCEPTS_PER_RATIO
    )
}

/// Up to [`CONCEPTS_PER_RATIO`] non-empty lines, list markers removed.
pub fn parse_concepts(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(CONCEPTS_PER_RATIO)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
        .unwrap_or(line);
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..]
            .strip_prefix('.')
            .or_else(|| line[digits..].strip_prefix(')'))
        {
            return rest.trim();
        }
    }
    line.trim()
}

/// Request concepts for every ratio concurrently. Results come back in the
/// order of `aspect_ratios`.
pub async fn generate_creative_concepts(
    service: &dyn GenerationService,
    prompt: &str,
    aspect_ratios: &[&str],
    language: Language,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Vec<CreativeResult> {
    let requests = aspect_ratios.iter().map(|ratio| async move {
        let request = GenerationRequest::text(build_creative_prompt(prompt, ratio, language), language);
        let concepts = call_with_retry(service, &request, policy, cancel)
            .await
            .map(|text| parse_concepts(&text));
        if let Err(err) = &concepts {
            tracing::warn!(aspect_ratio = %ratio, error = %err, "creative concepts failed");
        }
        CreativeResult {
            aspect_ratio: ratio.to_string(),
            concepts,
        }
    });
    join_all(requests).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_three_clean_lines() {
        let text = "\n1. Pão saindo do forno\n\n2) Família no café da manhã\n- Vitrine iluminada\n* Padeiro sorrindo\n";
        assert_eq!(
            parse_concepts(text),
            [
                "Pão saindo do forno",
                "Família no café da manhã",
                "Vitrine iluminada"
            ]
        );
    }

    #[test]
    fn parse_keeps_plain_numbers() {
        assert_eq!(parse_concepts("2026 lançamentos"), ["2026 lançamentos"]);
        assert!(parse_concepts("  \n \n").is_empty());
    }

    #[test]
    fn prompt_names_ratio_and_language() {
        let prompt = build_creative_prompt("padaria artesanal", "9:16", Language::En);
        assert!(prompt.starts_with("Respond in English."));
        assert!(prompt.contains("padaria artesanal"));
        assert!(prompt.contains("Aspect ratio: 9:16"));
    }
}
