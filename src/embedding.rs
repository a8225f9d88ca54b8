//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// The [`model_id`](EmbeddingProvider::model_id) string is stable per backend
/// and is used for dimension inference when neither the documents nor
/// [`dimensions`](EmbeddingProvider::dimensions) report a width.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The dimensionality of embeddings produced by this provider, if the
    /// backend reports one explicitly.
    fn dimensions(&self) -> Option<usize> {
        None
    }

    /// A stable identifier for the underlying embedding model.
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32])
        }

        fn model_id(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn embed_batch_defaults_to_sequential_embed() {
        let embedder = CountingEmbedder;
        let embeddings = embedder.embed_batch(&["a", "bb", "ccc"]).await.unwrap();
        assert_eq!(embeddings, vec![vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[test]
    fn dimensions_default_to_none() {
        assert_eq!(CountingEmbedder.dimensions(), None);
    }
}
