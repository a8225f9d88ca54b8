//! Embedding dimension inference.
//!
//! The dimension fixes the width of the `vector(n)` column for the lifetime
//! of a collection, so it is resolved once per run: first from the documents
//! themselves, then from the embedder, then from a small table of known
//! models, and finally from a documented default.

use tracing::{debug, warn};

use crate::document::DocumentRecord;
use crate::embedding::EmbeddingProvider;

/// Fallback dimension when nothing else reports one.
pub const DEFAULT_DIMENSION: usize = 1536;

/// Known model-identifier substrings and their embedding widths.
const KNOWN_MODEL_DIMENSIONS: &[(&str, usize)] = &[
    ("text-embedding-3-large", 3072),
    ("text-embedding-3-small", 1536),
    ("text-embedding-ada-002", 1536),
    ("embed-english-v3", 1024),
    ("all-minilm", 384),
];

/// Infer the embedding dimension for a run.
///
/// Scans `documents` in order and returns the length of the first non-empty
/// precomputed embedding. Otherwise asks the embedder for an explicit
/// dimension, then pattern-matches its model identifier against
/// [`KNOWN_MODEL_DIMENSIONS`]. Falls back to [`DEFAULT_DIMENSION`] with a
/// warning; the fallback is a heuristic, not a guarantee. An empty document
/// list is not an error.
pub fn detect_dimension(documents: &[DocumentRecord], embedder: &dyn EmbeddingProvider) -> usize {
    if let Some(dimension) = documents
        .iter()
        .find_map(|doc| doc.embedding.as_ref().filter(|e| !e.is_empty()).map(Vec::len))
    {
        debug!(dimension, "inferred dimension from precomputed document embedding");
        return dimension;
    }

    if let Some(dimension) = embedder.dimensions() {
        debug!(dimension, model = embedder.model_id(), "embedder reports explicit dimension");
        return dimension;
    }

    let model = embedder.model_id();
    for (pattern, dimension) in KNOWN_MODEL_DIMENSIONS {
        if model.contains(pattern) {
            debug!(dimension, model, "inferred dimension from known model table");
            return *dimension;
        }
    }

    warn!(model, dimension = DEFAULT_DIMENSION, "unknown embedding model, using default dimension");
    DEFAULT_DIMENSION
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::Result;

    struct FakeEmbedder {
        model: &'static str,
        dimensions: Option<usize>,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; self.dimensions.unwrap_or(DEFAULT_DIMENSION)])
        }

        fn dimensions(&self) -> Option<usize> {
            self.dimensions
        }

        fn model_id(&self) -> &str {
            self.model
        }
    }

    #[test]
    fn first_nonempty_document_embedding_wins() {
        let documents = vec![
            DocumentRecord::new("no embedding"),
            DocumentRecord::new("empty").with_embedding(vec![]),
            DocumentRecord::new("real").with_embedding(vec![0.1; 768]),
            DocumentRecord::new("other").with_embedding(vec![0.1; 3072]),
        ];
        let embedder = FakeEmbedder { model: "text-embedding-3-small", dimensions: Some(1536) };
        assert_eq!(detect_dimension(&documents, &embedder), 768);
    }

    #[test]
    fn explicit_embedder_dimension_beats_model_table() {
        let embedder = FakeEmbedder { model: "text-embedding-3-small", dimensions: Some(512) };
        assert_eq!(detect_dimension(&[], &embedder), 512);
    }

    #[test]
    fn known_model_table_is_consulted() {
        let embedder = FakeEmbedder { model: "openai/text-embedding-3-large", dimensions: None };
        assert_eq!(detect_dimension(&[], &embedder), 3072);

        let embedder = FakeEmbedder { model: "text-embedding-ada-002", dimensions: None };
        assert_eq!(detect_dimension(&[], &embedder), 1536);
    }

    #[test]
    fn unknown_model_falls_back_to_default() {
        let embedder = FakeEmbedder { model: "mystery-model", dimensions: None };
        assert_eq!(detect_dimension(&[], &embedder), DEFAULT_DIMENSION);
    }
}
