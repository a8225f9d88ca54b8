//! Data types for document records and search hits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved metadata key. Embeddings live in a dedicated column, never in
/// the metadata map, so this key is stripped before persistence.
pub const EMBEDDING_METADATA_KEY: &str = "embedding";

/// A text record to be stored, with metadata and an optional precomputed
/// embedding.
///
/// Records are produced by upstream document/embedding collaborators and are
/// read-only to this crate, except that the reserved `embedding` metadata key
/// is removed before the record is written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    /// The text content of the record.
    pub text: String,
    /// Key-value metadata associated with the record, persisted as JSONB.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Optional precomputed embedding vector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl DocumentRecord {
    /// Create a record with empty metadata and no embedding.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: Map::new(), embedding: None }
    }

    /// Attach metadata to the record.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach a precomputed embedding to the record.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Whether this record carries a usable (non-empty) precomputed embedding.
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// A stored record returned from a similarity search, paired with a
/// relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// The text content of the matching record.
    pub text: String,
    /// The metadata stored alongside the record.
    pub metadata: Map<String, Value>,
    /// The similarity score in `[0.0, 1.0]` (higher is more relevant).
    pub score: f32,
}
