use std::collections::HashMap;

use brandwatch_common::error::BrandwatchError;
use brandwatch_common::types::{Chunk, ChunkMetrics, ChunkResult, ClusterResult, Mention};
use regex::Regex;

use crate::clustering::Clusterer;
use crate::embeddings::InstrumentedEmbeddingAdapter;
use crate::llm::adapter::LlmAdapter;
use crate::spike::SpikeDetector;
use crate::timer::Stopwatch;

/// Sequences a chunk through preprocess -> embed -> cluster -> per-cluster
/// (summarize -> sentiment -> spike detect), accumulating per-stage
/// timings into a single `ChunkMetrics`.
pub struct ChunkProcessor {
    worker_id: String,
    embedding_adapter: InstrumentedEmbeddingAdapter,
    llm_adapter: LlmAdapter,
    clusterer: Box<dyn Clusterer>,
    spike_detector: SpikeDetector,
    preprocessing_examples: usize,
    clean_url_re: Regex,
    clean_whitespace_re: Regex,
}

impl ChunkProcessor {
    pub fn new(
        worker_id: String,
        embedding_adapter: InstrumentedEmbeddingAdapter,
        llm_adapter: LlmAdapter,
        clusterer: Box<dyn Clusterer>,
        spike_detector: SpikeDetector,
        preprocessing_examples: usize,
    ) -> Self {
        Self {
            worker_id,
            embedding_adapter,
            llm_adapter,
            clusterer,
            spike_detector,
            preprocessing_examples,
            clean_url_re: Regex::new(r"https?://\S+").expect("static regex is valid"),
            clean_whitespace_re: Regex::new(r"\s+").expect("static regex is valid"),
        }
    }

    pub async fn process_chunk(&self, chunk: &Chunk, fetch_time_ms: f64) -> Result<ChunkResult, BrandwatchError> {
        let mut metrics = ChunkMetrics {
            io_time_ms: fetch_time_ms,
            ..Default::default()
        };
        let total_sw = Stopwatch::start();

        let mentions = self.preprocess(chunk, &mut metrics);
        if mentions.is_empty() {
            metrics.total_task_time_ms = total_sw.elapsed_ms() + metrics.io_time_ms;
            return Ok(ChunkResult {
                chunk_id: chunk.chunk_id.clone(),
                brand: chunk.brand.clone(),
                timestamp: chunk.created_at.timestamp(),
                clusters: Vec::new(),
                metrics,
            });
        }

        let texts: Vec<String> = mentions.iter().map(|m| m.text.clone()).collect();
        let (embeddings, embed_ms) = self
            .embedding_adapter
            .embed(&texts, &chunk.brand, &chunk.chunk_id)
            .await;
        metrics.embedding_time_ms = embed_ms;

        let clustering_sw = Stopwatch::start();
        let outcome = self.clusterer.cluster(&embeddings).await;
        metrics.clustering_time_ms = clustering_sw.elapsed_ms();
        let _ = outcome.duration_ms;

        let clusters = self
            .analyze_clusters(chunk, &mentions, &outcome.clusters, &mut metrics)
            .await?;

        metrics.total_task_time_ms = total_sw.elapsed_ms() + metrics.io_time_ms;

        tracing::info!(
            worker_id = %self.worker_id,
            brand = %chunk.brand,
            chunk_id = %chunk.chunk_id,
            mentions = mentions.len(),
            clusters = clusters.len(),
            "chunk processed"
        );

        Ok(ChunkResult {
            chunk_id: chunk.chunk_id.clone(),
            brand: chunk.brand.clone(),
            timestamp: chunk.created_at.timestamp(),
            clusters,
            metrics,
        })
    }

    /// Strips URLs, collapses whitespace, lowercases, drops blanks, and
    /// dedups on cleaned text (first occurrence wins), preserving
    /// encounter order.
    fn preprocess(&self, chunk: &Chunk, metrics: &mut ChunkMetrics) -> Vec<Mention> {
        let sw = Stopwatch::start();
        let mut seen: HashMap<String, ()> = HashMap::new();
        let mut result = Vec::new();

        for mention in &chunk.mentions {
            let cleaned = self.clean_text(&mention.text);
            if cleaned.is_empty() {
                continue;
            }
            if seen.contains_key(&cleaned) {
                continue;
            }
            seen.insert(cleaned.clone(), ());
            result.push(Mention {
                id: mention.id.clone(),
                source: mention.source.clone(),
                text: cleaned,
                created_at: mention.created_at,
                sentiment: mention.sentiment.clone(),
                metadata: mention.metadata.clone(),
            });
        }

        let elapsed_ms = sw.elapsed_ms();
        metrics.preprocessing_time_ms = elapsed_ms;
        metrics::histogram!(
            "worker_preprocessing_time_seconds",
            "worker_id" => self.worker_id.clone(),
            "brand" => chunk.brand.clone()
        )
        .record(elapsed_ms / 1000.0);

        tracing::info!(
            worker_id = %self.worker_id,
            brand = %chunk.brand,
            chunk_id = %chunk.chunk_id,
            original_mentions = chunk.mentions.len(),
            clean_mentions = result.len(),
            preprocessing_time_ms = elapsed_ms,
            "preprocessing completed"
        );

        result
    }

    fn clean_text(&self, text: &str) -> String {
        let without_urls = self.clean_url_re.replace_all(text, "");
        let collapsed = self.clean_whitespace_re.replace_all(&without_urls, " ");
        collapsed.trim().to_lowercase()
    }

    async fn analyze_clusters(
        &self,
        chunk: &Chunk,
        mentions: &[Mention],
        clusters: &[crate::clustering::ClusterGroup],
        metrics: &mut ChunkMetrics,
    ) -> Result<Vec<ClusterResult>, BrandwatchError> {
        let mut results = Vec::new();
        let mut llm_total_ms = 0.0;
        let mut spike_total_ms = 0.0;

        for grouping in clusters {
            let cluster_mentions: Vec<&Mention> = grouping.indices.iter().map(|&i| &mentions[i]).collect();
            let texts: Vec<String> = cluster_mentions.iter().map(|m| m.text.clone()).collect();
            let examples: Vec<String> = texts.iter().take(self.preprocessing_examples).cloned().collect();

            let llm_sw = Stopwatch::start();
            let summary = self.llm_adapter.summarize(&texts, &chunk.brand, &chunk.chunk_id).await?;
            let sentiment = self.llm_adapter.sentiment(&texts, &chunk.brand, &chunk.chunk_id).await?;
            llm_total_ms += llm_sw.elapsed_ms();

            let spike_sw = Stopwatch::start();
            let is_spike = self
                .spike_detector
                .check_and_record(&chunk.brand, grouping.cluster_id, cluster_mentions.len() as u64)
                .await;
            spike_total_ms += spike_sw.elapsed_ms();

            results.push(ClusterResult {
                cluster_id: grouping.cluster_id,
                count: cluster_mentions.len(),
                examples,
                summary: Some(summary),
                spike: is_spike,
                sentiment,
            });
        }

        metrics.llm_time_ms = llm_total_ms;
        metrics.spike_detection_time_ms = spike_total_ms;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_urls_and_collapses_whitespace() {
        let processor_regexes = (
            Regex::new(r"https?://\S+").unwrap(),
            Regex::new(r"\s+").unwrap(),
        );
        let without_urls = processor_regexes.0.replace_all("Check  this https://x.com out", "");
        let collapsed = processor_regexes.1.replace_all(&without_urls, " ");
        assert_eq!(collapsed.trim().to_lowercase(), "check this out");
    }

    #[test]
    fn clean_text_of_only_a_url_is_empty() {
        let url_re = Regex::new(r"https?://\S+").unwrap();
        let ws_re = Regex::new(r"\s+").unwrap();
        let without_urls = url_re.replace_all("https://x.com", "");
        let collapsed = ws_re.replace_all(&without_urls, " ");
        assert_eq!(collapsed.trim(), "");
    }
}
