//! Validated configuration for the storage orchestrator.
//!
//! All range and non-empty checks happen once, in
//! [`StoreConfigBuilder::build`], before any database call is made. Call
//! sites receive an already-valid [`StoreConfig`] and never re-validate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::metadata::MetadataStrategy;

/// Default prefix for the physical tables when no `table_prefix` is set.
const DEFAULT_TABLE_PREFIX: &str = "vec_pg_";

/// Bounds for `search_k`.
pub const SEARCH_K_RANGE: (usize, usize) = (1, 50);
/// Bounds for `batch_size`.
pub const BATCH_SIZE_RANGE: (usize, usize) = (10, 1000);

/// Similarity algorithm used for vector search and index construction.
///
/// Maps to a pgvector distance operator and index operator class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceAlgorithm {
    /// Cosine distance (`<=>`), the store default.
    #[default]
    Cosine,
    /// Euclidean / L2 distance (`<->`).
    Euclidean,
    /// Inner product (`<#>`).
    InnerProduct,
}

impl DistanceAlgorithm {
    /// The pgvector distance operator for this algorithm.
    pub fn operator(&self) -> &'static str {
        match self {
            DistanceAlgorithm::Cosine => "<=>",
            DistanceAlgorithm::Euclidean => "<->",
            DistanceAlgorithm::InnerProduct => "<#>",
        }
    }

    /// The pgvector index operator class for this algorithm.
    pub fn ops_class(&self) -> &'static str {
        match self {
            DistanceAlgorithm::Cosine => "vector_cosine_ops",
            DistanceAlgorithm::Euclidean => "vector_l2_ops",
            DistanceAlgorithm::InnerProduct => "vector_ip_ops",
        }
    }

    /// Convert a raw operator result to a similarity score in `[0.0, 1.0]`.
    ///
    /// Cosine distance maps via `1 - d`; Euclidean via `1 / (1 + d)`; the
    /// inner-product operator returns the negated product, mapped via
    /// `(1 - d) / 2` for normalized vectors.
    pub fn distance_to_similarity(&self, distance: f64) -> f64 {
        match self {
            DistanceAlgorithm::Cosine => 1.0 - distance,
            DistanceAlgorithm::Euclidean => 1.0 / (1.0 + distance),
            DistanceAlgorithm::InnerProduct => (1.0 - distance) / 2.0,
        }
    }
}

/// Search parameters carried by the retriever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Similarity algorithm to search with.
    pub algorithm: DistanceAlgorithm,
    /// Number of results to return, in `[1, 50]`.
    pub k: usize,
    /// Minimum similarity score, in `[0.0, 1.0]`. Zero disables filtering.
    pub score_threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { algorithm: DistanceAlgorithm::Cosine, k: 4, score_threshold: 0.0 }
    }
}

impl SearchConfig {
    /// Validate the search parameters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `k` or `score_threshold` is out of
    /// range.
    pub fn validate(&self) -> Result<()> {
        let (k_min, k_max) = SEARCH_K_RANGE;
        if self.k < k_min || self.k > k_max {
            return Err(StoreError::Config(format!(
                "search_k ({}) must be in [{k_min}, {k_max}]",
                self.k
            )));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(StoreError::Config(format!(
                "score_threshold ({}) must be in [0.0, 1.0]",
                self.score_threshold
            )));
        }
        Ok(())
    }
}

/// Configuration for one orchestration run.
///
/// Construct via [`StoreConfig::builder()`]; `build()` performs all
/// validation up front.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Connection string for the target database.
    pub dsn: String,
    /// Logical collection name. Required and non-empty: a shared default
    /// collection silently mixing unrelated datasets is a correctness bug.
    pub collection_name: String,
    /// Optional prefix namespacing the physical tables for tenant isolation.
    pub table_prefix: Option<String>,
    /// Drop and recreate the collection before writing. Destructive.
    pub pre_delete_collection: bool,
    /// Operator-supplied metadata combined with each document's own.
    pub custom_metadata: Map<String, Value>,
    /// Whether document metadata survives under the `Merge` strategy.
    pub preserve_document_metadata: bool,
    /// How custom and document metadata are combined.
    pub metadata_strategy: MetadataStrategy,
    /// Run the schema optimization pass before writing.
    pub auto_optimize: bool,
    /// Embedding dimension; `0` means auto-detect.
    pub embedding_dimension: usize,
    /// Search parameters handed to the retriever.
    pub search: SearchConfig,
    /// Documents per write batch, in `[10, 1000]`.
    pub batch_size: usize,
}

impl StoreConfig {
    /// Create a new builder for constructing a [`StoreConfig`].
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    fn table_prefix(&self) -> String {
        match &self.table_prefix {
            Some(prefix) => format!("{}_", sanitize_identifier(prefix)),
            None => DEFAULT_TABLE_PREFIX.to_string(),
        }
    }

    /// Physical name of the collection registry table.
    pub fn collection_table_name(&self) -> String {
        format!("{}collection", self.table_prefix())
    }

    /// Physical name of the embedding table.
    pub fn embedding_table_name(&self) -> String {
        format!("{}embedding", self.table_prefix())
    }
}

/// Sanitize a name for use as a SQL identifier.
/// Only allows alphanumeric characters and underscores.
pub(crate) fn sanitize_identifier(name: &str) -> String {
    name.chars().map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' }).collect()
}

/// Builder for constructing a validated [`StoreConfig`].
#[derive(Debug, Clone)]
pub struct StoreConfigBuilder {
    dsn: String,
    collection_name: String,
    table_prefix: Option<String>,
    pre_delete_collection: bool,
    custom_metadata: Map<String, Value>,
    preserve_document_metadata: bool,
    metadata_strategy: MetadataStrategy,
    auto_optimize: bool,
    embedding_dimension: usize,
    search: SearchConfig,
    batch_size: usize,
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            collection_name: String::new(),
            table_prefix: None,
            pre_delete_collection: false,
            custom_metadata: Map::new(),
            preserve_document_metadata: true,
            metadata_strategy: MetadataStrategy::Merge,
            auto_optimize: true,
            embedding_dimension: 0,
            search: SearchConfig::default(),
            batch_size: 100,
        }
    }
}

impl StoreConfigBuilder {
    /// Set the database connection string.
    pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
        self.dsn = dsn.into();
        self
    }

    /// Set the logical collection name.
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = name.into();
        self
    }

    /// Namespace the physical tables with a per-tenant prefix.
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    /// Drop and recreate the collection before writing.
    pub fn pre_delete_collection(mut self, pre_delete: bool) -> Self {
        self.pre_delete_collection = pre_delete;
        self
    }

    /// Set operator-supplied metadata applied per the metadata strategy.
    pub fn custom_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.custom_metadata = metadata;
        self
    }

    /// Keep document metadata as the base map under the `Merge` strategy.
    pub fn preserve_document_metadata(mut self, preserve: bool) -> Self {
        self.preserve_document_metadata = preserve;
        self
    }

    /// Set how custom and document metadata are combined.
    pub fn metadata_strategy(mut self, strategy: MetadataStrategy) -> Self {
        self.metadata_strategy = strategy;
        self
    }

    /// Enable or disable the schema optimization pass.
    pub fn auto_optimize(mut self, auto_optimize: bool) -> Self {
        self.auto_optimize = auto_optimize;
        self
    }

    /// Fix the embedding dimension instead of auto-detecting it.
    pub fn embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    /// Set the similarity algorithm used by the retriever.
    pub fn search_algorithm(mut self, algorithm: DistanceAlgorithm) -> Self {
        self.search.algorithm = algorithm;
        self
    }

    /// Set the number of search results to return.
    pub fn search_k(mut self, k: usize) -> Self {
        self.search.k = k;
        self
    }

    /// Set the minimum similarity score for search results.
    pub fn score_threshold(mut self, threshold: f32) -> Self {
        self.search.score_threshold = threshold;
        self
    }

    /// Set the number of documents per write batch.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Build the [`StoreConfig`], validating all parameters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if:
    /// - `dsn` is empty
    /// - `collection_name` is empty
    /// - `table_prefix` is set but empty after sanitization
    /// - `search_k` is outside `[1, 50]`
    /// - `score_threshold` is outside `[0.0, 1.0]`
    /// - `batch_size` is outside `[10, 1000]`
    pub fn build(self) -> Result<StoreConfig> {
        if self.dsn.is_empty() {
            return Err(StoreError::Config("dsn is required".to_string()));
        }
        if self.collection_name.is_empty() {
            return Err(StoreError::Config("collection_name must not be empty".to_string()));
        }
        if let Some(prefix) = &self.table_prefix {
            if sanitize_identifier(prefix).is_empty() {
                return Err(StoreError::Config(
                    "table_prefix must not be empty after sanitization".to_string(),
                ));
            }
        }
        self.search.validate()?;
        let (batch_min, batch_max) = BATCH_SIZE_RANGE;
        if self.batch_size < batch_min || self.batch_size > batch_max {
            return Err(StoreError::Config(format!(
                "batch_size ({}) must be in [{batch_min}, {batch_max}]",
                self.batch_size
            )));
        }

        Ok(StoreConfig {
            dsn: self.dsn,
            collection_name: self.collection_name,
            table_prefix: self.table_prefix,
            pre_delete_collection: self.pre_delete_collection,
            custom_metadata: self.custom_metadata,
            preserve_document_metadata: self.preserve_document_metadata,
            metadata_strategy: self.metadata_strategy,
            auto_optimize: self.auto_optimize,
            embedding_dimension: self.embedding_dimension,
            search: self.search,
            batch_size: self.batch_size,
        })
    }
}
