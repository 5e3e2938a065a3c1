mod local;
mod remote;

pub use local::LocalEmbeddingAdapter;
pub use remote::RemoteEmbeddingAdapter;

use std::future::Future;
use std::pin::Pin;

use ndarray::Array2;

use crate::config::EmbeddingsProvider;
use crate::timer::Stopwatch;

/// Produces dense embeddings for a batch of texts. One row per input
/// text, `dim` columns. Object-safe via manual future boxing so adapters
/// can be swapped behind a trait object at runtime.
pub trait EmbeddingAdapter: Send + Sync {
    fn embed<'a>(
        &'a self,
        texts: &'a [String],
        brand: &'a str,
        chunk_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Array2<f64>> + Send + 'a>>;
}

/// Wraps a delegate adapter to emit timing metrics and a structured log
/// line per call, independent of which backend actually ran.
pub struct InstrumentedEmbeddingAdapter {
    delegate: Box<dyn EmbeddingAdapter>,
    worker_id: String,
}

impl InstrumentedEmbeddingAdapter {
    pub fn new(delegate: Box<dyn EmbeddingAdapter>, worker_id: String) -> Self {
        Self { delegate, worker_id }
    }

    pub async fn embed(&self, texts: &[String], brand: &str, chunk_id: &str) -> (Array2<f64>, f64) {
        let sw = Stopwatch::start();
        let embeddings = self.delegate.embed(texts, brand, chunk_id).await;
        let elapsed_ms = sw.elapsed_ms();

        metrics::histogram!(
            "worker_embedding_time_seconds",
            "worker_id" => self.worker_id.clone(),
            "brand" => brand.to_string()
        )
        .record(elapsed_ms / 1000.0);

        tracing::info!(
            worker_id = %self.worker_id,
            brand,
            chunk_id,
            texts = texts.len(),
            embedding_time_ms = elapsed_ms,
            "embeddings generated"
        );

        (embeddings, elapsed_ms)
    }
}

/// Build the configured embedding backend, wrapped for instrumentation.
pub fn build_embedding_adapter(
    provider: EmbeddingsProvider,
    worker_id: String,
) -> InstrumentedEmbeddingAdapter {
    let delegate: Box<dyn EmbeddingAdapter> = match provider {
        EmbeddingsProvider::Local => Box::new(LocalEmbeddingAdapter::new(384)),
        EmbeddingsProvider::OpenAi => Box::new(RemoteEmbeddingAdapter::new("openai", 384)),
        EmbeddingsProvider::Gemini => Box::new(RemoteEmbeddingAdapter::new("gemini", 384)),
    };
    InstrumentedEmbeddingAdapter::new(delegate, worker_id)
}
