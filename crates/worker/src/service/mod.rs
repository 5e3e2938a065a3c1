use std::sync::Arc;
use std::time::Duration;

use brandwatch_common::types::{Chunk, FailureRecord};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::WorkerConfig;
use crate::consumer::{extract_brand_from_queue, QueueConsumer};
use crate::processor::ChunkProcessor;
use crate::result_storage::ResultStorage;
use crate::store::StoreClient;

/// Owns the store client, consumer, processor and result storage, and runs
/// the two long-lived background tasks (heartbeat, processing) described
/// in the worker lifecycle. `start`/`stop` are both idempotent.
pub struct WorkerService {
    store: Arc<StoreClient>,
    consumer: tokio::sync::Mutex<QueueConsumer>,
    processor: Arc<ChunkProcessor>,
    result_storage: Arc<ResultStorage>,
    worker_id: String,
    heartbeat_interval_sec: u64,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerService {
    pub fn new(
        config: &WorkerConfig,
        store: Arc<StoreClient>,
        consumer: QueueConsumer,
        processor: ChunkProcessor,
        result_storage: ResultStorage,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            store,
            consumer: tokio::sync::Mutex::new(consumer),
            processor: Arc::new(processor),
            result_storage: Arc::new(result_storage),
            worker_id: config.worker_id.clone(),
            heartbeat_interval_sec: config.heartbeat_interval_sec.max(1),
            stop_tx,
            stop_rx,
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Ensures the store connection is live, clears the stop signal, and
    /// spawns the heartbeat and processing loops.
    pub async fn start(self: &Arc<Self>) -> Result<(), brandwatch_common::error::BrandwatchError> {
        self.store
            .ensure_connection()
            .await
            .map_err(|e| brandwatch_common::error::BrandwatchError::Store(e.to_string()))?;
        let _ = self.stop_tx.send(false);

        let mut tasks = self.tasks.lock().await;

        let heartbeat_self = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            heartbeat_self.heartbeat_loop().await;
        }));

        let processing_self = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            processing_self.processing_loop().await;
        }));

        tracing::info!(worker_id = %self.worker_id, "worker service started");
        Ok(())
    }

    /// Sets the stop signal, cancels and awaits both background tasks
    /// (swallowing cancellation errors), and closes the store client.
    /// Safe to call more than once.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);

        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }

        self.store.close().await;
        tracing::info!(worker_id = %self.worker_id, "worker service stopped");
    }

    async fn heartbeat_loop(&self) {
        let mut stop_rx = self.stop_rx.clone();
        let interval = Duration::from_secs(self.heartbeat_interval_sec);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.store.set_heartbeat(&self.worker_id, self.heartbeat_interval_sec).await;
                }
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn processing_loop(&self) {
        let mut stop_rx = self.stop_rx.clone();
        loop {
            if *stop_rx.borrow() {
                break;
            }

            let fetched = {
                let mut consumer = self.consumer.lock().await;
                tokio::select! {
                    fetched = consumer.fetch() => fetched,
                    _ = stop_rx.changed() => {
                        continue;
                    }
                }
            };

            let Some(fetched) = fetched else {
                continue;
            };

            self.handle_payload(fetched.queue_key, fetched.payload, fetched.fetch_time_ms)
                .await;
        }
    }

    /// Decodes, validates, processes and (on success) pushes the result
    /// for a single fetched payload. Every exit path is either success,
    /// dead-letter, or the caller's cancellation — this method itself
    /// never panics the processing loop.
    async fn handle_payload(&self, queue_key: String, payload: String, fetch_time_ms: f64) {
        let brand_hint = extract_brand_from_queue(&queue_key);

        let raw: serde_json::Value = match serde_json::from_str(&payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(worker_id = %self.worker_id, brand = %brand_hint, error = %err, "payload is not valid JSON");
                self.dead_letter(&brand_hint, "unknown", "Invalid JSON", &payload, "json_decode")
                    .await;
                return;
            }
        };

        let chunk: Chunk = match serde_json::from_value(raw.clone()) {
            Ok(chunk) => chunk,
            Err(err) => {
                let chunk_id = raw.get("chunkId").and_then(|v| v.as_str()).unwrap_or("unknown");
                tracing::warn!(worker_id = %self.worker_id, brand = %brand_hint, chunk_id, error = %err, "chunk failed schema validation");
                self.dead_letter(&brand_hint, chunk_id, "Validation failed", &payload, "validation")
                    .await;
                return;
            }
        };

        if let Err(err) = chunk.validate() {
            let chunk_id = raw.get("chunkId").and_then(|v| v.as_str()).unwrap_or("unknown");
            tracing::warn!(worker_id = %self.worker_id, brand = %brand_hint, chunk_id, error = %err, "chunk failed schema validation");
            self.dead_letter(&brand_hint, chunk_id, "Validation failed", &payload, "validation")
                .await;
            return;
        }

        let brand = if chunk.brand.trim().is_empty() {
            brand_hint.clone()
        } else {
            chunk.brand.clone()
        };

        let mut result = match self.processor.process_chunk(&chunk, fetch_time_ms).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(worker_id = %self.worker_id, brand = %brand, chunk_id = %chunk.chunk_id, error = %err, "chunk processing failed");
                self.dead_letter(&brand, &chunk.chunk_id, &format!("Processing error: {err}"), &payload, "processing")
                    .await;
                return;
            }
        };

        match self.result_storage.push_result(&brand, &result).await {
            Ok(push_time_ms) => {
                result.metrics.io_time_ms += push_time_ms;
                result.metrics.total_task_time_ms += push_time_ms;

                metrics::counter!(
                    "worker_chunks_processed_total",
                    "worker_id" => self.worker_id.clone(),
                    "brand" => brand.clone()
                )
                .increment(1);
                metrics::histogram!(
                    "worker_processing_time_seconds",
                    "worker_id" => self.worker_id.clone(),
                    "brand" => brand.clone()
                )
                .record(result.metrics.total_task_time_ms / 1000.0);
            }
            Err(err) => {
                tracing::error!(worker_id = %self.worker_id, brand = %brand, chunk_id = %chunk.chunk_id, error = %err, "failed to push chunk result");
                self.dead_letter(&brand, &chunk.chunk_id, &format!("Processing error: {err}"), &payload, "processing")
                    .await;
            }
        }
    }

    async fn dead_letter(&self, brand: &str, chunk_id: &str, reason: &str, payload: &str, reason_label: &str) {
        let record = FailureRecord {
            worker_id: self.worker_id.clone(),
            brand: brand.to_string(),
            chunk_id: chunk_id.to_string(),
            reason: reason.to_string(),
            payload: payload.to_string(),
        };

        if let Err(err) = self.result_storage.record_failure(brand, &record, reason_label).await {
            tracing::error!(worker_id = %self.worker_id, brand, chunk_id, error = %err, "failed to record dead-letter");
        }
    }
}

/// Used by the HTTP `/readyz` handler; cheap to clone, independent of the
/// fuller [`WorkerService`] so the axum state doesn't need the whole
/// service wired through every handler.
#[derive(Clone)]
pub struct ReadinessFlag(Arc<std::sync::atomic::AtomicBool>);

impl ReadinessFlag {
    pub fn new() -> Self {
        Self(Arc::new(std::sync::atomic::AtomicBool::new(false)))
    }

    pub fn set_ready(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for ReadinessFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_flag_starts_unready() {
        let flag = ReadinessFlag::new();
        assert!(!flag.is_ready());
        flag.set_ready();
        assert!(flag.is_ready());
    }
}
