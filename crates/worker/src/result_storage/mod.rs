use std::sync::Arc;

use brandwatch_common::error::BrandwatchError;
use brandwatch_common::types::{ChunkResult, ClusterResult, FailureRecord};
use chrono::Utc;

use crate::store::StoreClient;
use crate::timer::Stopwatch;

/// Reshapes internal [`ChunkResult`]s into the orchestrator's external JSON
/// schema and pushes them to the per-brand result queue; also dead-letters
/// [`FailureRecord`]s to the per-brand failure queue.
pub struct ResultStorage {
    store: Arc<StoreClient>,
    worker_id: String,
}

impl ResultStorage {
    pub fn new(store: Arc<StoreClient>, worker_id: String) -> Self {
        Self { store, worker_id }
    }

    /// Serializes `result` into the orchestrator payload, pushes it to
    /// `<result_prefix>:<brand>:chunks`, and returns the push duration in
    /// milliseconds so callers can fold it back into `io_time_ms`.
    pub async fn push_result(&self, brand: &str, result: &ChunkResult) -> Result<f64, BrandwatchError> {
        let payload = build_orchestrator_payload(brand, result);
        let serialized = serde_json::to_string(&payload)?;

        let sw = Stopwatch::start();
        self.store
            .rpush(&self.store.result_key(brand), &serialized)
            .await
            .map_err(|e| BrandwatchError::Store(e.to_string()))?;
        let push_time_ms = sw.elapsed_ms();

        metrics::histogram!(
            "worker_io_time_seconds",
            "worker_id" => self.worker_id.clone(),
            "brand" => brand.to_string(),
            "operation" => "push"
        )
        .record(push_time_ms / 1000.0);

        tracing::info!(
            worker_id = %self.worker_id,
            brand,
            chunk_id = %result.chunk_id,
            push_time_ms,
            "result pushed"
        );

        Ok(push_time_ms)
    }

    /// Serializes `record`, rpushes it to `<failed_prefix>:<brand>`, and
    /// increments the failure counter labelled with `reason_label` (the
    /// error-category key, distinct from `record.reason`'s human message).
    pub async fn record_failure(&self, brand: &str, record: &FailureRecord, reason_label: &str) -> Result<f64, BrandwatchError> {
        let serialized = serde_json::to_string(record)?;

        let sw = Stopwatch::start();
        self.store
            .record_failure(&self.store.failed_key(brand), &serialized)
            .await
            .map_err(|e| BrandwatchError::Store(e.to_string()))?;
        let push_time_ms = sw.elapsed_ms();

        metrics::histogram!(
            "worker_io_time_seconds",
            "worker_id" => self.worker_id.clone(),
            "brand" => brand.to_string(),
            "operation" => "failure"
        )
        .record(push_time_ms / 1000.0);
        metrics::counter!(
            "worker_chunks_failed_total",
            "worker_id" => self.worker_id.clone(),
            "brand" => brand.to_string(),
            "reason" => reason_label.to_string()
        )
        .increment(1);

        tracing::warn!(
            worker_id = %self.worker_id,
            brand,
            chunk_id = %record.chunk_id,
            reason = %record.reason,
            reason_label,
            "chunk dead-lettered"
        );

        Ok(push_time_ms)
    }
}

/// `true` iff `text` looks like a serialized sentiment object rather than a
/// prose summary, disqualifying it as a label/topic candidate.
fn looks_like_sentiment_blob(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('{')
        && trimmed.ends_with('}')
        && trimmed.contains("positive")
        && trimmed.contains("negative")
}

fn normalize_text(text: &str) -> String {
    text.trim().to_string()
}

/// The cleaned summary if it's non-empty and doesn't look like a stray
/// sentiment blob, else the cluster's first example, else `None`. Shared
/// by the `label`/`topics`/`summary` fields; only `label` forces a final
/// `"Cluster <id>"` fallback on top of this.
fn normalized_candidate(cluster: &ClusterResult) -> Option<String> {
    if let Some(summary) = &cluster.summary {
        let normalized = normalize_text(summary);
        if !normalized.is_empty() && !looks_like_sentiment_blob(&normalized) {
            return Some(normalized);
        }
    }
    cluster.examples.first().map(|e| normalize_text(e)).filter(|e| !e.is_empty())
}

fn cluster_label(cluster: &ClusterResult) -> String {
    normalized_candidate(cluster).unwrap_or_else(|| format!("Cluster {}", cluster.cluster_id))
}

fn build_clusters_payload(result: &ChunkResult) -> Vec<serde_json::Value> {
    result
        .clusters
        .iter()
        .map(|cluster| {
            serde_json::json!({
                "id": cluster.cluster_id.to_string(),
                "label": cluster_label(cluster),
                "mentions": cluster.examples,
                "sentimentScore": cluster.sentiment.positive - cluster.sentiment.negative,
                "spike": cluster.spike,
                "mentionCount": cluster.count,
            })
        })
        .collect()
}

/// Count-weighted (simple) average of each cluster's sentiment, plus the
/// derived `positive - negative` score. All-zero when there are no
/// clusters.
fn aggregate_sentiment(result: &ChunkResult) -> serde_json::Value {
    let n = result.clusters.len();
    if n == 0 {
        return serde_json::json!({ "positive": 0.0, "negative": 0.0, "neutral": 0.0, "score": 0.0 });
    }

    let n = n as f64;
    let positive = result.clusters.iter().map(|c| c.sentiment.positive).sum::<f64>() / n;
    let negative = result.clusters.iter().map(|c| c.sentiment.negative).sum::<f64>() / n;
    let neutral = result.clusters.iter().map(|c| c.sentiment.neutral).sum::<f64>() / n;

    serde_json::json!({
        "positive": positive,
        "negative": negative,
        "neutral": neutral,
        "score": positive - negative,
    })
}

fn extract_topics(result: &ChunkResult) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut topics = Vec::new();
    for cluster in &result.clusters {
        if let Some(candidate) = normalized_candidate(cluster) {
            if seen.insert(candidate.clone()) {
                topics.push(candidate);
            }
        }
        if topics.len() >= 10 {
            break;
        }
    }
    topics
}

fn combine_summaries(result: &ChunkResult) -> String {
    result
        .clusters
        .iter()
        .filter_map(normalized_candidate)
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_orchestrator_payload(brand: &str, result: &ChunkResult) -> serde_json::Value {
    // processedAt is the instant this payload is built, not the chunk's
    // own created_at (that's `result.timestamp`, kept for internal use).
    let processed_at = Utc::now();
    let spike_detected = result.clusters.iter().any(|c| c.spike);
    let mention_count: usize = result.clusters.iter().map(|c| c.count).sum();

    serde_json::json!({
        "chunkId": result.chunk_id,
        "brand": brand,
        "processedAt": processed_at.to_rfc3339(),
        "sentiment": aggregate_sentiment(result),
        "clusters": build_clusters_payload(result),
        "topics": extract_topics(result),
        "summary": combine_summaries(result),
        "spikeDetected": spike_detected,
        "meta": {
            "metrics": result.metrics,
            "mentionCount": mention_count,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use brandwatch_common::types::{ChunkMetrics, SentimentScores};

    fn cluster(cluster_id: i64, summary: Option<&str>, examples: &[&str], spike: bool, count: usize) -> ClusterResult {
        ClusterResult {
            cluster_id,
            count,
            examples: examples.iter().map(|s| s.to_string()).collect(),
            summary: summary.map(|s| s.to_string()),
            spike,
            sentiment: SentimentScores { positive: 0.6, negative: 0.1, neutral: 0.3 },
        }
    }

    fn chunk_result(clusters: Vec<ClusterResult>) -> ChunkResult {
        ChunkResult {
            chunk_id: "c1".to_string(),
            brand: "acme".to_string(),
            timestamp: 1_700_000_000,
            clusters,
            metrics: ChunkMetrics::default(),
        }
    }

    #[test]
    fn label_prefers_cleaned_summary() {
        let c = cluster(0, Some("  Great product buzz  "), &["fallback example"], false, 3);
        assert_eq!(cluster_label(&c), "Great product buzz");
    }

    #[test]
    fn label_rejects_sentiment_blob_and_falls_back_to_example() {
        let c = cluster(0, Some("{\"positive\":0.5,\"negative\":0.5}"), &["first example"], false, 2);
        assert_eq!(cluster_label(&c), "first example");
    }

    #[test]
    fn label_falls_back_to_cluster_id_literal() {
        let c = cluster(7, None, &[], false, 1);
        assert_eq!(cluster_label(&c), "Cluster 7");
    }

    #[test]
    fn topics_are_deduped_and_capped_at_ten() {
        let clusters: Vec<ClusterResult> = (0..15)
            .map(|i| cluster(i, Some("same topic"), &[], false, 1))
            .collect();
        let result = chunk_result(clusters);
        let topics = extract_topics(&result);
        assert_eq!(topics, vec!["same topic".to_string()]);
    }

    #[test]
    fn empty_clusters_yield_zero_sentiment_and_no_spike() {
        let result = chunk_result(Vec::new());
        let payload = build_orchestrator_payload("acme", &result);
        assert_eq!(payload["sentiment"]["positive"], 0.0);
        assert_eq!(payload["spikeDetected"], false);
        assert_eq!(payload["meta"]["mentionCount"], 0);
        assert_eq!(payload["summary"], "");
        assert_eq!(payload["topics"], serde_json::json!([]));
    }

    #[test]
    fn mention_count_sums_cluster_counts() {
        let result = chunk_result(vec![
            cluster(0, Some("a"), &["a"], false, 3),
            cluster(1, Some("b"), &["b"], true, 2),
        ]);
        let payload = build_orchestrator_payload("acme", &result);
        assert_eq!(payload["meta"]["mentionCount"], 5);
        assert_eq!(payload["spikeDetected"], true);
    }
}
