use std::future::Future;
use std::pin::Pin;

use ndarray::Array2;

use super::EmbeddingAdapter;

/// Placeholder remote embedding adapter. Returns an all-zero matrix and
/// warns; no remote embedding API is wired up yet.
pub struct RemoteEmbeddingAdapter {
    provider: &'static str,
    dim: usize,
}

impl RemoteEmbeddingAdapter {
    pub fn new(provider: &'static str, dim: usize) -> Self {
        Self { provider, dim }
    }
}

impl EmbeddingAdapter for RemoteEmbeddingAdapter {
    fn embed<'a>(
        &'a self,
        texts: &'a [String],
        brand: &'a str,
        chunk_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Array2<f64>> + Send + 'a>> {
        Box::pin(async move {
            tracing::warn!(
                provider = self.provider,
                texts = texts.len(),
                brand,
                chunk_id,
                "remote embedding provider not implemented; returning zeros"
            );
            Array2::<f64>::zeros((texts.len(), self.dim))
        })
    }
}
