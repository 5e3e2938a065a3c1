use serde::{Deserialize, Serialize};

/// Per-stage wall-clock durations for processing a single chunk, in milliseconds.
///
/// `io_time_ms` is seeded with the fetch time before processing begins and
/// has the push time added afterwards — it therefore double-counts into
/// both this field and the `worker_io_time_seconds{op="push"}` histogram
/// observation. That is intentional (see `ResultStorage::push_result`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChunkMetrics {
    pub preprocessing_time_ms: f64,
    pub embedding_time_ms: f64,
    pub clustering_time_ms: f64,
    pub llm_time_ms: f64,
    pub spike_detection_time_ms: f64,
    pub io_time_ms: f64,
    pub total_task_time_ms: f64,
}

/// Sentiment breakdown for a cluster (or an aggregate over clusters).
///
/// Not renormalized — callers pass through whatever the LLM adapter or
/// the aggregation step produced, including sums that stray from 1.0 when
/// upstream parsing fell back to a partial default.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SentimentScores {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl SentimentScores {
    /// The default used when sentiment analysis yields nothing usable.
    pub fn default_unknown() -> Self {
        Self {
            positive: 0.33,
            negative: 0.33,
            neutral: 0.34,
        }
    }
}

/// One grouping of semantically similar mentions within a chunk, after analysis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterResult {
    pub cluster_id: i64,
    pub count: usize,
    pub examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub spike: bool,
    pub sentiment: SentimentScores,
}

/// The complete result of processing one chunk, produced once and never
/// mutated after construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk_id: String,
    pub brand: String,
    /// Epoch seconds, taken from the originating chunk's `created_at`.
    pub timestamp: i64,
    pub clusters: Vec<ClusterResult>,
    pub metrics: ChunkMetrics,
}
