use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Minimum number of prior observations required before a spike can be
/// declared. Below this, history is too thin to estimate variance.
const MIN_HISTORY_SAMPLES: usize = 3;

/// Storage seam for spike history, object-safe via manual future boxing
/// like the embedding/LLM adapter traits. Lets `SpikeDetector` be driven
/// by an in-memory fake in tests, without a live store.
pub trait SpikeHistoryStore: Send + Sync {
    fn spike_history<'a>(
        &'a self,
        brand: &'a str,
        cluster_id: i64,
    ) -> Pin<Box<dyn Future<Output = Vec<i64>> + Send + 'a>>;

    fn append_spike_history<'a>(
        &'a self,
        brand: &'a str,
        cluster_id: i64,
        value: i64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Detects count spikes for a `(brand, cluster_id)` pair against its
/// rolling history in the store.
pub struct SpikeDetector {
    store: Arc<dyn SpikeHistoryStore>,
}

impl SpikeDetector {
    pub fn new(store: Arc<dyn SpikeHistoryStore>) -> Self {
        Self { store }
    }

    /// Fetches prior history, classifies `current_count` against it, then
    /// appends `current_count` to the history. Returns whether this count
    /// is a spike.
    pub async fn check_and_record(&self, brand: &str, cluster_id: i64, current_count: u64) -> bool {
        let history = self.store.spike_history(brand, cluster_id).await;
        let is_spike = classify(&history, current_count);
        self.store.append_spike_history(brand, cluster_id, current_count as i64).await;
        is_spike
    }
}

/// Pure classification: population mean/stddev of `history`, spike iff
/// `current_count > mean + 2*stddev && current_count > 1`, never a spike
/// with fewer than `MIN_HISTORY_SAMPLES` prior observations.
fn classify(history: &[i64], current_count: u64) -> bool {
    if history.len() < MIN_HISTORY_SAMPLES {
        return false;
    }
    if current_count <= 1 {
        return false;
    }

    let n = history.len() as f64;
    let mean = history.iter().map(|v| *v as f64).sum::<f64>() / n;
    let variance = history.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    current_count as f64 > mean + 2.0 * stddev
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_spike_with_too_little_history() {
        assert!(!classify(&[1, 1], 50));
    }

    #[test]
    fn not_a_spike_when_count_is_one_or_less() {
        assert!(!classify(&[1, 1, 1, 1], 1));
    }

    #[test]
    fn flags_a_count_far_above_the_historical_mean() {
        let history = vec![1; 10];
        assert!(classify(&history, 10));
    }

    #[test]
    fn does_not_flag_a_count_within_normal_variance() {
        let history = vec![3, 4, 5, 4, 3, 5, 4];
        assert!(!classify(&history, 5));
    }
}
