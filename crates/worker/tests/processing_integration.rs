use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use brandwatch_common::types::{Chunk, Mention};
use brandwatch_worker::clustering::{ClusterGroup, Clusterer, ClusteringOutcome};
use brandwatch_worker::config::EmbeddingsProvider;
use brandwatch_worker::embeddings::build_embedding_adapter;
use brandwatch_worker::llm::adapter::LlmAdapter;
use brandwatch_worker::llm::executor::LlmExecutor;
use brandwatch_worker::llm::mock::MockProvider;
use brandwatch_worker::processor::ChunkProcessor;
use brandwatch_worker::spike::{SpikeDetector, SpikeHistoryStore};
use chrono::{TimeZone, Utc};

/// Fixed-grouping stub so a test controls exactly which mentions land in
/// which cluster, independent of the real k-means implementation.
struct StubClusterer {
    groups: Vec<ClusterGroup>,
}

impl Clusterer for StubClusterer {
    fn cluster<'a>(
        &'a self,
        _embeddings: &'a ndarray::Array2<f64>,
    ) -> Pin<Box<dyn Future<Output = ClusteringOutcome> + Send + 'a>> {
        let clusters = self.groups.clone();
        Box::pin(async move {
            ClusteringOutcome {
                clusters,
                duration_ms: 0.0,
            }
        })
    }
}

/// In-memory spike history, standing in for the Redis-backed store so
/// these tests never touch the network.
#[derive(Default)]
struct InMemorySpikeStore {
    history: Mutex<std::collections::HashMap<(String, i64), Vec<i64>>>,
}

impl SpikeHistoryStore for InMemorySpikeStore {
    fn spike_history<'a>(
        &'a self,
        brand: &'a str,
        cluster_id: i64,
    ) -> Pin<Box<dyn Future<Output = Vec<i64>> + Send + 'a>> {
        let key = (brand.to_string(), cluster_id);
        Box::pin(async move {
            self.history.lock().unwrap().get(&key).cloned().unwrap_or_default()
        })
    }

    fn append_spike_history<'a>(
        &'a self,
        brand: &'a str,
        cluster_id: i64,
        value: i64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        let key = (brand.to_string(), cluster_id);
        Box::pin(async move {
            self.history.lock().unwrap().entry(key).or_default().push(value);
        })
    }
}

fn mention(id: &str, text: &str) -> Mention {
    Mention {
        id: id.to_string(),
        source: "tw".to_string(),
        text: text.to_string(),
        created_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
        sentiment: None,
        metadata: None,
    }
}

fn chunk(brand: &str, chunk_id: &str, mentions: Vec<Mention>) -> Chunk {
    Chunk {
        brand: brand.to_string(),
        chunk_id: chunk_id.to_string(),
        created_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
        mentions,
        meta: None,
    }
}

fn mock_llm_adapter() -> LlmAdapter {
    let primary = LlmExecutor::new(Box::new(MockProvider::new()), 4, 5, 0.0);
    LlmAdapter::new(primary, None, 160, "worker-test".to_string())
}

fn processor_with(groups: Vec<ClusterGroup>, history: InMemorySpikeStore) -> ChunkProcessor {
    let embedding_adapter = build_embedding_adapter(EmbeddingsProvider::Local, "worker-test".to_string());
    let spike_detector = SpikeDetector::new(Arc::new(history));
    ChunkProcessor::new(
        "worker-test".to_string(),
        embedding_adapter,
        mock_llm_adapter(),
        Box::new(StubClusterer { groups }),
        spike_detector,
        5,
    )
}

/// S1 — happy path: dedup drops the repeated mention, two clusters come
/// back with non-empty summaries and a mention count of two.
#[tokio::test]
async fn happy_path_dedupes_and_clusters() {
    let input = chunk(
        "acme",
        "c1",
        vec![
            mention("m1", "Great product!"),
            mention("m2", "great product!"),
            mention("m3", "Terrible bug"),
        ],
    );

    let groups = vec![
        ClusterGroup { cluster_id: 0, indices: vec![0] },
        ClusterGroup { cluster_id: 1, indices: vec![1] },
    ];
    let processor = processor_with(groups, InMemorySpikeStore::default());

    let result = processor.process_chunk(&input, 1.0).await.unwrap();

    assert_eq!(result.clusters.len(), 2);
    let mention_count: usize = result.clusters.iter().map(|c| c.count).sum();
    assert_eq!(mention_count, 2);
    assert!(result.clusters.iter().all(|c| c.summary.as_ref().is_some_and(|s| !s.is_empty())));
    assert!(result.metrics.total_task_time_ms >= result.metrics.io_time_ms);
}

/// S4 — a chunk whose only mention is a bare URL cleans to nothing, so
/// processing short-circuits to an empty, non-spiking result.
#[tokio::test]
async fn url_only_mention_yields_empty_result() {
    let input = chunk("acme", "c4", vec![mention("m1", "https://x.com")]);

    let groups = vec![ClusterGroup { cluster_id: 0, indices: vec![0] }];
    let processor = processor_with(groups, InMemorySpikeStore::default());

    let result = processor.process_chunk(&input, 1.0).await.unwrap();

    assert!(result.clusters.is_empty());
    assert!(result.metrics.total_task_time_ms >= result.metrics.io_time_ms);
}

/// S5 — a cluster whose history is ten flat observations and whose
/// current count is also ten full mentions should flag as a spike once
/// the count clears the mean+2*stddev bar for a non-trivial cluster.
#[tokio::test]
async fn seeded_history_flags_a_spike() {
    let mentions: Vec<Mention> = (0..10).map(|i| mention(&format!("m{i}"), &format!("distinct mention body {i}"))).collect();
    let input = chunk("acme", "c5", mentions);

    let groups = vec![ClusterGroup { cluster_id: 7, indices: (0..10).collect() }];

    let history = InMemorySpikeStore::default();
    history
        .history
        .lock()
        .unwrap()
        .insert(("acme".to_string(), 7), vec![1; 10]);

    let processor = processor_with(groups, history);
    let result = processor.process_chunk(&input, 1.0).await.unwrap();

    assert_eq!(result.clusters.len(), 1);
    assert!(result.clusters[0].spike);
}
