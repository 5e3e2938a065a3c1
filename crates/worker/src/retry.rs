use std::future::Future;
use std::time::Duration;

/// Retry an idempotent, fallible operation with exponential backoff.
///
/// Sleeps `base_delay * 2^attempt` between attempts (no jitter). The final
/// attempt's error is returned verbatim — callers that need to log or wrap
/// it do so themselves. Only ever used around operations whose store-side
/// effect is naturally idempotent (list appends, key SETs, heartbeats).
pub async fn with_retry<F, Fut, T, E>(mut op: F, retries: u32, base_delay: Duration) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= retries {
                    return Err(err);
                }
                let delay = base_delay.mul_f64(2f64.powi(attempt as i32));
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_immediately_without_sleeping() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(7)
                    }
                }
            },
            5,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn reraises_final_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("still broken") }
            },
            2,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Err("still broken"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
