//! Property tests for embedding dimension inference.

use async_trait::async_trait;
use proptest::prelude::*;

use pgvector_store::dimension::{DEFAULT_DIMENSION, detect_dimension};
use pgvector_store::document::DocumentRecord;
use pgvector_store::embedding::EmbeddingProvider;
use pgvector_store::error::Result;

struct StubEmbedder {
    model: String,
    dimensions: Option<usize>,
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.dimensions.unwrap_or(DEFAULT_DIMENSION)])
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// A document that may or may not carry an embedding of the given width.
fn arb_document(width: usize) -> impl Strategy<Value = DocumentRecord> {
    ("[a-z ]{1,20}", any::<bool>()).prop_map(move |(text, with_embedding)| {
        let doc = DocumentRecord::new(text);
        if with_embedding { doc.with_embedding(vec![0.5; width]) } else { doc }
    })
}

proptest! {
    /// For any list containing at least one non-empty embedding, detection
    /// returns the length of the first such embedding.
    #[test]
    fn first_embedding_length_wins(
        prefix in proptest::collection::vec(arb_document(32), 0..5),
        suffix in proptest::collection::vec(arb_document(64), 0..5),
        first_width in 1usize..256,
    ) {
        let mut documents = prefix;
        // Strip embeddings from the prefix so the pinned document is first.
        for doc in &mut documents {
            doc.embedding = None;
        }
        documents.push(DocumentRecord::new("pinned").with_embedding(vec![0.1; first_width]));
        documents.extend(suffix);

        let embedder = StubEmbedder { model: "unrelated".to_string(), dimensions: Some(999) };
        prop_assert_eq!(detect_dimension(&documents, &embedder), first_width);
    }

    /// Without any document embeddings or an explicit embedder dimension,
    /// detection always lands on a known-model entry or the default.
    #[test]
    fn fallback_is_known_or_default(model in "[a-z0-9-]{0,40}") {
        let embedder = StubEmbedder { model, dimensions: None };
        let detected = detect_dimension(&[], &embedder);
        prop_assert!([384, 1024, 1536, 3072, DEFAULT_DIMENSION].contains(&detected));
    }
}
