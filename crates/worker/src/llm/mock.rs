use std::future::Future;
use std::pin::Pin;

use super::{LlmError, LlmProvider};

const POSITIVE_WORDS: &[&str] = &["great", "good", "love", "awesome", "excellent", "improved", "success", "fast"];
const NEGATIVE_WORDS: &[&str] = &["bad", "hate", "poor", "slow", "issue", "problem", "bug", "error"];
const PLACEHOLDER_SENTIMENT_JSON: &str = "{\"positive\":0.33,\"negative\":0.33,\"neutral\":0.34}";

/// Deterministic in-process LLM used for the `mock` provider and every
/// test in this workspace. A sentiment prompt gets a lexicon-scored JSON
/// reply. A summary prompt echoes the first line of the *texts* being
/// summarized (not the instruction preamble), truncated to 160
/// characters. Anything else — a prompt with neither shape recognized —
/// gets the placeholder sentiment JSON, the same fallback the reference
/// mock returns for unrecognized input.
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    fn respond(&self, prompt: &str) -> String {
        if prompt.contains("Analyse the sentiment") {
            return sentiment_from_lexicon(prompt);
        }
        match prompt.split_once("Texts:\n") {
            Some((_, body)) => {
                let first_line = body.lines().next().unwrap_or("").trim();
                let truncated: String = first_line.chars().take(160).collect();
                if truncated.is_empty() {
                    "no summary available".to_string()
                } else {
                    truncated
                }
            }
            None => PLACEHOLDER_SENTIMENT_JSON.to_string(),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn sentiment_from_lexicon(prompt: &str) -> String {
    let body = match prompt.split_once("Texts:\n") {
        Some((_, rest)) => rest,
        None => prompt,
    };
    let lines: Vec<&str> = body.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let lines: Vec<&str> = if lines.is_empty() {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed]
        }
    } else {
        lines
    };

    let mut positive = 0u32;
    let mut negative = 0u32;
    let mut neutral = 0u32;

    for line in &lines {
        let lower = line.to_lowercase();
        let pos_hits = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
        let neg_hits = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
        if pos_hits > neg_hits {
            positive += 1;
        } else if neg_hits > pos_hits {
            negative += 1;
        } else {
            neutral += 1;
        }
    }

    let total = (positive + negative + neutral).max(1) as f64;
    format!(
        "{{\"positive\":{:.6},\"negative\":{:.6},\"neutral\":{:.6}}}",
        positive as f64 / total,
        negative as f64 / total,
        neutral as f64 / total
    )
}

impl LlmProvider for MockProvider {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.respond(prompt)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn summary_truncates_first_line_of_the_texts_to_160_chars() {
        let provider = MockProvider::new();
        let long_line = "x".repeat(200);
        let prompt = format!(
            "You are an analyst summarizing brand mentions.\nSummarize the following texts into a concise overview (max 160 tokens).\nTexts:\n{long_line}\n"
        );
        let result = provider.complete(&prompt).await.unwrap();
        assert_eq!(result.chars().count(), 160);
    }

    #[tokio::test]
    async fn summary_reads_the_texts_not_the_instruction_preamble() {
        let provider = MockProvider::new();
        let prompt = "You are an analyst summarizing brand mentions.\nSummarize the following texts into a concise overview (max 160 tokens).\nTexts:\nGreat product launch\n";
        let result = provider.complete(prompt).await.unwrap();
        assert_eq!(result, "Great product launch");
    }

    #[tokio::test]
    async fn sentiment_prompt_counts_lexicon_hits() {
        let provider = MockProvider::new();
        let prompt = "Analyse the sentiment of the texts below\nTexts:\nThis is a great and awesome product\nThis has a bad bug";
        let result = provider.complete(prompt).await.unwrap();
        assert!(result.contains("\"positive\""));
        assert!(result.contains("\"negative\""));
    }

    #[tokio::test]
    async fn unrecognized_prompt_returns_placeholder_sentiment() {
        let provider = MockProvider::new();
        let result = provider.complete("hello there").await.unwrap();
        assert_eq!(result, "{\"positive\":0.33,\"negative\":0.33,\"neutral\":0.34}");
    }
}
