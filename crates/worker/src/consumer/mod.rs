use std::sync::Arc;
use std::time::Instant;

use crate::store::StoreClient;
use crate::timer::Stopwatch;

/// Result of a successful fetch: the queue key the payload came from, the
/// raw JSON payload, and how long the fetch took.
pub struct FetchedChunk {
    pub queue_key: String,
    pub payload: String,
    pub fetch_time_ms: f64,
}

/// Continuously polls every brand queue with BLPOP, tracking how long the
/// worker has been idle so it can be surfaced as a gauge and periodically
/// logged.
pub struct QueueConsumer {
    store: Arc<StoreClient>,
    worker_id: String,
    blpop_timeout_sec: u64,
    metrics_wait_log_interval_sec: u64,
    waiting_since: Option<Instant>,
    last_wait_log: Option<Instant>,
}

impl QueueConsumer {
    pub fn new(
        store: Arc<StoreClient>,
        worker_id: String,
        blpop_timeout_sec: u64,
        metrics_wait_log_interval_sec: u64,
    ) -> Self {
        Self {
            store,
            worker_id,
            blpop_timeout_sec,
            metrics_wait_log_interval_sec,
            waiting_since: None,
            last_wait_log: None,
        }
    }

    pub async fn fetch(&mut self) -> Option<FetchedChunk> {
        let queue_keys = self.store.scan_brand_queues().await;
        if queue_keys.is_empty() {
            tokio::time::sleep(std::time::Duration::from_secs(self.blpop_timeout_sec)).await;
            self.update_waiting(&[]);
            return None;
        }

        let sw = Stopwatch::start();
        let result = self.store.blpop(&queue_keys, self.blpop_timeout_sec).await;
        let fetch_time_ms = sw.elapsed_ms();

        let Some((queue_key, payload)) = result else {
            self.update_waiting(&queue_keys);
            metrics::histogram!(
                "worker_io_time_seconds",
                "worker_id" => self.worker_id.clone(),
                "brand" => "unknown",
                "operation" => "fetch"
            )
            .record(fetch_time_ms / 1000.0);
            return None;
        };

        self.clear_waiting();
        let brand = extract_brand_from_queue(&queue_key);
        metrics::histogram!(
            "worker_io_time_seconds",
            "worker_id" => self.worker_id.clone(),
            "brand" => brand.clone(),
            "operation" => "fetch"
        )
        .record(fetch_time_ms / 1000.0);
        tracing::info!(worker_id = %self.worker_id, queue = %queue_key, fetch_time_ms, "fetched chunk from redis");

        Some(FetchedChunk {
            queue_key,
            payload,
            fetch_time_ms,
        })
    }

    fn update_waiting(&mut self, queues: &[String]) {
        let now = Instant::now();
        let since = *self.waiting_since.get_or_insert(now);
        let elapsed = now.duration_since(since).as_secs_f64();
        metrics::gauge!("worker_waiting_seconds", "worker_id" => self.worker_id.clone()).set(elapsed);

        let should_log = match self.last_wait_log {
            None => true,
            Some(last) => now.duration_since(last).as_secs() >= self.metrics_wait_log_interval_sec,
        };
        if should_log {
            let queue_names = if queues.is_empty() {
                "<none>".to_string()
            } else {
                queues.join(", ")
            };
            tracing::info!(worker_id = %self.worker_id, queues = %queue_names, waiting_seconds = elapsed, "waiting for new tasks");
            self.last_wait_log = Some(now);
        }
    }

    fn clear_waiting(&mut self) {
        self.waiting_since = None;
        metrics::gauge!("worker_waiting_seconds", "worker_id" => self.worker_id.clone()).set(0.0);
    }
}

/// `<queue_prefix>:<brand>:chunks` -> `<brand>`. Falls back to `"unknown"`
/// for malformed keys rather than failing the fetch.
pub fn extract_brand_from_queue(queue_key: &str) -> String {
    let parts: Vec<&str> = queue_key.split(':').collect();
    if parts.len() >= 3 {
        parts[1].to_string()
    } else {
        "unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_brand_from_well_formed_key() {
        assert_eq!(extract_brand_from_queue("brandwatch:acme:chunks"), "acme");
    }

    #[test]
    fn falls_back_to_unknown_for_malformed_key() {
        assert_eq!(extract_brand_from_queue("brandwatch"), "unknown");
    }
}
