//! Query-ready retrieval handle.

use std::sync::Arc;

use crate::config::{DistanceAlgorithm, SearchConfig};
use crate::document::SearchHit;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::store::PgVectorStore;

/// A configured query handle over a [`PgVectorStore`].
///
/// Built via [`Retriever::build`], which validates the search parameters
/// before touching the store.
pub struct Retriever {
    store: Arc<PgVectorStore>,
    search: SearchConfig,
}

impl Retriever {
    /// Wrap a store handle with validated search parameters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`](crate::StoreError::Config) if `k` is
    /// outside `[1, 50]` or `score_threshold` is outside `[0.0, 1.0]`.
    pub fn build(store: Arc<PgVectorStore>, search: SearchConfig) -> Result<Self> {
        search.validate()?;
        Ok(Self { store, search })
    }

    /// The search parameters this retriever was built with.
    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    /// The underlying store handle.
    pub fn store(&self) -> &Arc<PgVectorStore> {
        &self.store
    }

    /// Retrieve the most similar records to a query embedding.
    pub async fn retrieve(&self, embedding: &[f32]) -> Result<Vec<SearchHit>> {
        let (k, threshold, algorithm) = effective_search_params(&self.search);
        self.store.similarity_search(embedding, k, threshold, algorithm).await
    }

    /// Embed a text query and retrieve the most similar records.
    pub async fn retrieve_text(
        &self,
        query: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<SearchHit>> {
        let embedding = embedder.embed(query).await?;
        self.retrieve(&embedding).await
    }
}

/// Effective parameters handed to the store: `k` always; the threshold only
/// when positive; the algorithm only when it differs from the store's cosine
/// default.
fn effective_search_params(
    search: &SearchConfig,
) -> (usize, Option<f32>, Option<DistanceAlgorithm>) {
    let threshold = (search.score_threshold > 0.0).then_some(search.score_threshold);
    let algorithm = (search.algorithm != DistanceAlgorithm::Cosine).then_some(search.algorithm);
    (search.k, threshold, algorithm)
}
