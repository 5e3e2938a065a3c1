use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::retry::with_retry;
use crate::spike::SpikeHistoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis connection error: {0}")]
    Connection(String),

    #[error("redis command error: {0}")]
    Command(String),
}

/// Wraps a single `redis::aio::MultiplexedConnection` with the queue,
/// heartbeat and spike-history operations the worker needs. One instance
/// is constructed at startup and shared by every task in the process.
pub struct StoreClient {
    conn: MultiplexedConnection,
    queue_prefix: String,
    result_prefix: String,
    failed_prefix: String,
    spike_prefix: String,
    spike_history_ttl_sec: u64,
    max_retries: u32,
    retry_backoff_base: Duration,
    // Guards the read-modify-write spike history pipeline so concurrent
    // cluster analyses for the same (brand, cluster) can't interleave.
    spike_lock: Arc<Mutex<()>>,
}

impl StoreClient {
    #[allow(clippy::too_many_arguments)]
    pub async fn connect(
        redis_url: &str,
        queue_prefix: &str,
        result_prefix: &str,
        failed_prefix: &str,
        spike_prefix: &str,
        spike_history_ttl_sec: u64,
        max_retries: u32,
        retry_backoff_base: f64,
    ) -> Result<Self, StoreError> {
        tracing::info!("connecting to redis");

        let client =
            redis::Client::open(redis_url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self {
            conn,
            queue_prefix: queue_prefix.to_string(),
            result_prefix: result_prefix.to_string(),
            failed_prefix: failed_prefix.to_string(),
            spike_prefix: spike_prefix.to_string(),
            spike_history_ttl_sec,
            max_retries,
            retry_backoff_base: Duration::from_secs_f64(retry_backoff_base),
            spike_lock: Arc::new(Mutex::new(())),
        };
        store.ensure_connection().await?;
        tracing::info!("redis connection established");
        Ok(store)
    }

    pub async fn ensure_connection(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        with_retry(
            || {
                let mut conn = conn.clone();
                async move {
                    let pong: String = redis::cmd("PING")
                        .query_async(&mut conn)
                        .await
                        .map_err(|e| StoreError::Command(e.to_string()))?;
                    if pong != "PONG" {
                        return Err(StoreError::Command(format!("unexpected PING reply: {pong}")));
                    }
                    Ok(())
                }
            },
            self.max_retries,
            self.retry_backoff_base,
        )
        .await?;
        let _ = &mut conn;
        Ok(())
    }

    /// Block for up to `timeout` seconds popping the head of the first
    /// ready key in `keys`. A BLPOP failure is logged and treated as an
    /// empty pop after sleeping out the timeout, mirroring the reference
    /// client's behavior of never propagating a transient Redis error up
    /// into the processing loop.
    pub async fn blpop(&self, keys: &[String], timeout_sec: u64) -> Option<(String, String)> {
        if keys.is_empty() {
            tokio::time::sleep(Duration::from_secs(timeout_sec)).await;
            return None;
        }

        let mut conn = self.conn.clone();
        let result: redis::RedisResult<Option<(String, String)>> = conn
            .blpop(keys, timeout_sec as f64)
            .await;

        match result {
            Ok(popped) => popped,
            Err(err) => {
                tracing::error!(error = %err, "BLPOP failed");
                tokio::time::sleep(Duration::from_secs(timeout_sec)).await;
                None
            }
        }
    }

    pub async fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        with_retry(
            || {
                let mut conn = conn.clone();
                async move {
                    conn.rpush::<_, _, ()>(key, value)
                        .await
                        .map_err(|e| StoreError::Command(e.to_string()))
                }
            },
            self.max_retries,
            self.retry_backoff_base,
        )
        .await
    }

    pub async fn set_heartbeat(&self, worker_id: &str, interval_sec: u64) {
        let ttl = heartbeat_ttl_sec(interval_sec);
        let mut conn = self.conn.clone();
        let key = format!("workers:heartbeat:{worker_id}");
        if let Err(err) = conn
            .set_ex::<_, _, ()>(&key, "alive", ttl)
            .await
        {
            tracing::warn!(error = %err, "heartbeat failed");
        }
    }

    pub async fn record_failure(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.rpush(key, value).await
    }

    /// SCAN for every brand chunk-queue key, cursor-paginated, deduplicated
    /// and sorted for deterministic iteration order.
    pub async fn scan_brand_queues(&self) -> Vec<String> {
        let pattern = format!("{}:*:chunks", self.queue_prefix);
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            let result: redis::RedisResult<(u64, Vec<String>)> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;

            match result {
                Ok((next_cursor, keys)) => {
                    seen.extend(keys);
                    if next_cursor == 0 {
                        break;
                    }
                    cursor = next_cursor;
                }
                Err(err) => {
                    tracing::error!(error = %err, "scanning brand queues failed");
                    break;
                }
            }
        }

        let mut results: Vec<String> = seen.into_iter().collect();
        results.sort();
        results
    }

    pub async fn spike_history(&self, brand: &str, cluster_id: i64) -> Vec<i64> {
        let key = self.spike_key(brand, cluster_id);
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<Vec<String>> = conn.lrange(&key, 0, -1).await;
        match result {
            Ok(values) => values.iter().filter_map(|v| v.parse::<i64>().ok()).collect(),
            Err(err) => {
                tracing::warn!(error = %err, "fetching spike history failed");
                Vec::new()
            }
        }
    }

    pub async fn append_spike_history(&self, brand: &str, cluster_id: i64, value: i64) {
        let key = self.spike_key(brand, cluster_id);
        let _guard = self.spike_lock.lock().await;
        let mut conn = self.conn.clone();

        let result: redis::RedisResult<()> = redis::pipe()
            .lpush(&key, value)
            .ignore()
            .ltrim(&key, 0, 99)
            .ignore()
            .expire(&key, self.spike_history_ttl_sec as i64)
            .ignore()
            .query_async(&mut conn)
            .await;

        if let Err(err) = result {
            tracing::warn!(error = %err, "updating spike history failed");
        }
    }

    fn spike_key(&self, brand: &str, cluster_id: i64) -> String {
        format!("{}:{}:{}", self.spike_prefix, brand, cluster_id)
    }

    pub fn failed_key(&self, brand: &str) -> String {
        format!("{}:{}", self.failed_prefix, brand)
    }

    pub fn result_key(&self, brand: &str) -> String {
        format!("{}:{}:chunks", self.result_prefix, brand)
    }

    /// Redis connections don't need an explicit close in the multiplexed
    /// client; kept for lifecycle symmetry with the rest of the service.
    pub async fn close(&self) {}
}

impl SpikeHistoryStore for StoreClient {
    fn spike_history<'a>(
        &'a self,
        brand: &'a str,
        cluster_id: i64,
    ) -> Pin<Box<dyn Future<Output = Vec<i64>> + Send + 'a>> {
        Box::pin(StoreClient::spike_history(self, brand, cluster_id))
    }

    fn append_spike_history<'a>(
        &'a self,
        brand: &'a str,
        cluster_id: i64,
        value: i64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(StoreClient::append_spike_history(self, brand, cluster_id, value))
    }
}

/// `max(2*interval, interval+5)`, per spec: the heartbeat TTL must always
/// outlive at least one missed tick by a 5s margin.
fn heartbeat_ttl_sec(interval_sec: u64) -> u64 {
    (interval_sec * 2).max(interval_sec + 5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_ttl_is_at_least_interval_plus_five() {
        assert_eq!(heartbeat_ttl_sec(1), 6);
        assert_eq!(heartbeat_ttl_sec(10), 20);
        assert!(heartbeat_ttl_sec(1) >= 1 + 5);
        assert!(heartbeat_ttl_sec(10) >= 10 + 5);
    }
}
