use std::future::Future;
use std::pin::Pin;

use ndarray::Array2;
use sha2::{Digest, Sha256};

use super::EmbeddingAdapter;

/// Deterministic hash-based embedding. The reference implementation's
/// primary model requires a local sentence-transformers download that
/// has no equivalent crate in this workspace's dependency stack, so this
/// adapter always runs the same SHA-256 tiling fallback it falls back to
/// when that model is unavailable.
pub struct LocalEmbeddingAdapter {
    dim: usize,
}

impl LocalEmbeddingAdapter {
    pub fn new(dim: usize) -> Self {
        tracing::warn!(dim, "using hash-based embedding fallback");
        Self { dim }
    }

    fn hash_embed(&self, texts: &[String]) -> Array2<f64> {
        let mut vectors = Array2::<f64>::zeros((texts.len(), self.dim));
        for (idx, text) in texts.iter().enumerate() {
            let digest = Sha256::digest(text.as_bytes());
            for col in 0..self.dim {
                let byte = digest[col % digest.len()];
                vectors[[idx, col]] = byte as f64 / 255.0;
            }
        }
        vectors
    }
}

impl EmbeddingAdapter for LocalEmbeddingAdapter {
    fn embed<'a>(
        &'a self,
        texts: &'a [String],
        _brand: &'a str,
        _chunk_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Array2<f64>> + Send + 'a>> {
        Box::pin(async move { self.hash_embed(texts) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_identical_rows() {
        let adapter = LocalEmbeddingAdapter::new(16);
        let texts = vec!["hello world".to_string(), "hello world".to_string()];
        let embeddings = adapter.embed(&texts, "acme", "c1").await;
        assert_eq!(embeddings.shape(), &[2, 16]);
        assert_eq!(embeddings.row(0), embeddings.row(1));
    }

    #[tokio::test]
    async fn different_text_yields_different_rows() {
        let adapter = LocalEmbeddingAdapter::new(16);
        let texts = vec!["hello".to_string(), "goodbye".to_string()];
        let embeddings = adapter.embed(&texts, "acme", "c1").await;
        assert_ne!(embeddings.row(0), embeddings.row(1));
    }

    #[tokio::test]
    async fn values_are_normalized_to_unit_interval() {
        let adapter = LocalEmbeddingAdapter::new(32);
        let texts = vec!["sample text".to_string()];
        let embeddings = adapter.embed(&texts, "acme", "c1").await;
        for value in embeddings.row(0) {
            assert!(*value >= 0.0 && *value <= 1.0);
        }
    }
}
