use brandwatch_common::error::BrandwatchError;
use brandwatch_common::types::SentimentScores;

use super::executor::LlmExecutor;
use crate::config::{LlmProvider as LlmProviderKind, WorkerConfig};
use crate::llm::mock::MockProvider;
use crate::llm::remote::RemoteProvider;
use crate::timer::Stopwatch;

const SENTIMENT_PROMPT_HEADER: &str = "You are a sentiment analysis assistant. Analyse the sentiment of the texts below and return a JSON object with keys positive, negative, neutral whose values are floats between 0 and 1 summing to 1.\nTexts:\n";

/// Produces summaries and sentiment scores for a cluster's texts,
/// calling the primary provider first and falling back to a secondary
/// provider (or the deterministic mock) if the primary call fails.
pub struct LlmAdapter {
    primary: LlmExecutor,
    fallback: Option<LlmExecutor>,
    max_tokens: u32,
    worker_id: String,
}

impl LlmAdapter {
    pub fn new(primary: LlmExecutor, fallback: Option<LlmExecutor>, max_tokens: u32, worker_id: String) -> Self {
        Self {
            primary,
            fallback,
            max_tokens,
            worker_id,
        }
    }

    /// Per spec §4.6 step 3: a primary failure with no fallback (or
    /// whose fallback also fails) propagates rather than degrading to an
    /// empty/placeholder value, so the caller can dead-letter the chunk.
    pub async fn summarize(&self, texts: &[String], brand: &str, chunk_id: &str) -> Result<String, BrandwatchError> {
        let prompt = format!(
            "You are an analyst summarizing brand mentions.\nSummarize the following texts into a concise overview (max {} tokens).\nTexts:\n{}\n",
            self.max_tokens,
            texts.join("\n")
        );
        self.invoke(&prompt, "summary", brand, chunk_id).await
    }

    /// As `summarize`: the call itself propagates on unrecoverable
    /// failure. A malformed (but successfully received) response still
    /// degrades to the placeholder distribution, per §4.6 step 4 — that
    /// is a parse fallback, not a call failure.
    pub async fn sentiment(&self, texts: &[String], brand: &str, chunk_id: &str) -> Result<SentimentScores, BrandwatchError> {
        let prompt = format!("{}{}\n", SENTIMENT_PROMPT_HEADER, texts.join("\n"));
        let text = self.invoke(&prompt, "sentiment", brand, chunk_id).await?;
        Ok(parse_sentiment_json(&text))
    }

    async fn invoke(&self, prompt: &str, operation: &str, brand: &str, chunk_id: &str) -> Result<String, BrandwatchError> {
        let sw = Stopwatch::start();

        let result = match self.primary.complete(prompt).await {
            Ok(text) => Ok(text),
            Err(primary_err) => {
                tracing::warn!(
                    worker_id = %self.worker_id,
                    brand,
                    chunk_id,
                    operation,
                    error = %primary_err,
                    "primary LLM failed, attempting fallback"
                );
                match &self.fallback {
                    Some(fallback) => fallback.complete(prompt).await.map_err(BrandwatchError::from),
                    None => Err(BrandwatchError::from(primary_err)),
                }
            }
        };

        let elapsed_ms = sw.elapsed_ms();
        metrics::histogram!(
            "worker_llm_latency_seconds",
            "worker_id" => self.worker_id.clone(),
            "brand" => brand.to_string(),
            "operation" => operation.to_string()
        )
        .record(elapsed_ms / 1000.0);

        if result.is_ok() {
            tracing::info!(
                worker_id = %self.worker_id,
                brand,
                chunk_id,
                operation,
                llm_time_ms = elapsed_ms,
                "llm operation completed"
            );
        }

        result
    }
}

fn default_sentiment_fallback() -> SentimentScores {
    SentimentScores {
        positive: 0.33,
        negative: 0.33,
        neutral: 0.34,
    }
}

/// Parses the sentiment JSON the provider returned, falling back to the
/// placeholder distribution on malformed JSON, and defaulting any
/// missing key the way the reference adapter does (`positive`/`negative`
/// default to 0.0, `neutral` defaults to 1.0).
fn parse_sentiment_json(raw: &str) -> SentimentScores {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => SentimentScores {
            positive: map.get("positive").and_then(|v| v.as_f64()).unwrap_or(0.0),
            negative: map.get("negative").and_then(|v| v.as_f64()).unwrap_or(0.0),
            neutral: map.get("neutral").and_then(|v| v.as_f64()).unwrap_or(1.0),
        },
        _ => default_sentiment_fallback(),
    }
}

/// Builds the configured primary/fallback provider pair and wraps each
/// in an executor. `mock` never has a fallback; `gemini`/`openai` fall
/// back to the other remote provider if configured, else to the mock.
pub fn build_llm_adapter(config: &WorkerConfig) -> Result<LlmAdapter, BrandwatchError> {
    let (primary_provider, fallback_provider): (Box<dyn super::LlmProvider>, Option<Box<dyn super::LlmProvider>>) =
        match config.llm_provider {
            LlmProviderKind::Mock => (Box::new(MockProvider::new()), None),
            LlmProviderKind::Gemini => {
                let api_key = config
                    .gemini_api_key
                    .clone()
                    .ok_or_else(|| BrandwatchError::Config("GEMINI_API_KEY must be set when LLM_PROVIDER is 'gemini'".into()))?;
                let primary = RemoteProvider::gemini(api_key, config.gemini_model.clone(), config.gemini_api_version.clone());
                let fallback: Box<dyn super::LlmProvider> = match &config.openai_api_key {
                    Some(key) => Box::new(RemoteProvider::openai(key.clone(), config.openai_model.clone())),
                    None => Box::new(MockProvider::new()),
                };
                (Box::new(primary), Some(fallback))
            }
            LlmProviderKind::OpenAi => {
                let api_key = config
                    .openai_api_key
                    .clone()
                    .ok_or_else(|| BrandwatchError::Config("OPENAI_API_KEY must be set when LLM_PROVIDER is 'openai'".into()))?;
                let primary = RemoteProvider::openai(api_key, config.openai_model.clone());
                let fallback: Box<dyn super::LlmProvider> = match &config.gemini_api_key {
                    Some(key) => Box::new(RemoteProvider::gemini(key.clone(), config.gemini_model.clone(), config.gemini_api_version.clone())),
                    None => Box::new(MockProvider::new()),
                };
                (Box::new(primary), Some(fallback))
            }
        };

    let primary = LlmExecutor::new(
        primary_provider,
        config.llm_max_concurrency,
        config.llm_timeout_sec,
        config.llm_min_delay_sec,
    );
    let fallback = fallback_provider.map(|p| {
        LlmExecutor::new(p, config.llm_max_concurrency, config.llm_timeout_sec, config.llm_min_delay_sec)
    });

    Ok(LlmAdapter::new(primary, fallback, config.llm_summary_max_tokens, config.worker_id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::executor::LlmExecutor;
    use crate::llm::mock::MockProvider;

    fn mock_adapter() -> LlmAdapter {
        let primary = LlmExecutor::new(Box::new(MockProvider::new()), 4, 5, 0.0);
        LlmAdapter::new(primary, None, 160, "worker-test".to_string())
    }

    #[tokio::test]
    async fn summarize_returns_truncated_first_line() {
        let adapter = mock_adapter();
        let texts = vec!["Product launch summary here".to_string()];
        let summary = adapter.summarize(&texts, "acme", "c1").await.unwrap();
        assert!(!summary.is_empty());
    }

    #[tokio::test]
    async fn sentiment_sums_to_roughly_one() {
        let adapter = mock_adapter();
        let texts = vec!["This is a great and awesome day".to_string(), "This has a bad bug".to_string()];
        let scores = adapter.sentiment(&texts, "acme", "c1").await.unwrap();
        let total = scores.positive + scores.negative + scores.neutral;
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn malformed_json_falls_back_to_placeholder() {
        let scores = parse_sentiment_json("not json");
        assert_eq!(scores.positive, 0.33);
        assert_eq!(scores.negative, 0.33);
        assert_eq!(scores.neutral, 0.34);
    }

    #[test]
    fn missing_keys_default_per_reference_adapter() {
        let scores = parse_sentiment_json("{}");
        assert_eq!(scores.positive, 0.0);
        assert_eq!(scores.negative, 0.0);
        assert_eq!(scores.neutral, 1.0);
    }

    /// A primary provider that always errors, standing in for a downed
    /// remote provider in the S6 primary-failure scenario.
    struct FailingProvider;

    impl super::super::LlmProvider for FailingProvider {
        fn complete<'a>(
            &'a self,
            _prompt: &'a str,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, super::super::LlmError>> + Send + 'a>> {
            Box::pin(async { Err(super::super::LlmError::Http("simulated outage".to_string())) })
        }
    }

    /// S6 — primary failure falls back to the mock provider and still
    /// yields a usable summary and sentiment.
    #[tokio::test]
    async fn primary_failure_falls_back_to_mock() {
        let primary = LlmExecutor::new(Box::new(FailingProvider), 4, 5, 0.0);
        let fallback = LlmExecutor::new(Box::new(MockProvider::new()), 4, 5, 0.0);
        let adapter = LlmAdapter::new(primary, Some(fallback), 160, "worker-test".to_string());

        let texts = vec!["Great product launch".to_string()];
        let summary = adapter.summarize(&texts, "acme", "c1").await.unwrap();
        assert!(!summary.is_empty());

        let sentiment = adapter.sentiment(&texts, "acme", "c1").await.unwrap();
        let total = sentiment.positive + sentiment.negative + sentiment.neutral;
        assert!((total - 1.0).abs() < 1e-6);
    }

    /// When primary fails and no fallback is configured, the error
    /// propagates to the caller instead of degrading to a placeholder,
    /// so the chunk can be dead-lettered (§4.6 step 3, §8.7).
    #[tokio::test]
    async fn primary_failure_without_fallback_propagates_error() {
        let primary = LlmExecutor::new(Box::new(FailingProvider), 4, 5, 0.0);
        let adapter = LlmAdapter::new(primary, None, 160, "worker-test".to_string());

        let texts = vec!["Great product launch".to_string()];
        assert!(adapter.summarize(&texts, "acme", "c1").await.is_err());
        assert!(adapter.sentiment(&texts, "acme", "c1").await.is_err());
    }
}
