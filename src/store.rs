//! pgvector-backed store handle.
//!
//! [`PgVectorStore`] owns the connection pool and the resolved physical
//! layout for one logical collection: a registry table mapping collection
//! names to ids, and an embedding table holding `(text, metadata, embedding)`
//! rows referencing their collection. The row layout depends on the
//! [`SelectedApi`] locked in at the start of the run — the new shape keys
//! rows by an explicit `id` text column, the legacy shape by a generated
//! uuid.
//!
//! Identifiers are sanitized before interpolation; all values are bound as
//! parameters. Vectors cross the wire as `'[a,b,c]'` text cast to `::vector`.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compat::SelectedApi;
use crate::config::{DistanceAlgorithm, StoreConfig, sanitize_identifier};
use crate::document::{DocumentRecord, SearchHit};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, StoreError};

/// A query- and write-ready handle over one collection in a pgvector
/// database.
pub struct PgVectorStore {
    pool: PgPool,
    collection_name: String,
    collection_table: String,
    embedding_table: String,
    dimension: usize,
    api: SelectedApi,
}

impl PgVectorStore {
    /// Open a connection pool for the given DSN.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connectivity`] if the connection cannot be
    /// opened. Fatal, no retry.
    pub async fn connect(dsn: &str) -> Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(5)
            .connect(dsn)
            .await
            .map_err(|e| StoreError::Connectivity(e.to_string()))
    }

    /// Create a store handle from an existing pool and a validated config.
    pub fn new(pool: PgPool, config: &StoreConfig, dimension: usize, api: SelectedApi) -> Self {
        Self {
            pool,
            collection_name: config.collection_name.clone(),
            collection_table: sanitize_identifier(&config.collection_table_name()),
            embedding_table: sanitize_identifier(&config.embedding_table_name()),
            dimension,
            api,
        }
    }

    /// The logical collection this handle targets.
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// The physical embedding table name.
    pub fn embedding_table(&self) -> &str {
        &self.embedding_table
    }

    /// The fixed embedding width for this collection.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The client shape this handle was built with.
    pub fn selected_api(&self) -> SelectedApi {
        self.api
    }

    /// A clone of the underlying pool.
    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    /// Create the base physical layout if absent and register the
    /// collection: extension, registry table, embedding table in the shape
    /// selected for this run, and the collection row.
    pub async fn ensure_schema(&self) -> Result<()> {
        let map_err = |e| StoreError::database("schema setup", e);

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(map_err)?;

        let collection_sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                uuid UUID PRIMARY KEY DEFAULT gen_random_uuid(), \
                name TEXT NOT NULL UNIQUE, \
                cmetadata JSONB\
            )",
            self.collection_table
        );
        sqlx::query(&collection_sql).execute(&self.pool).await.map_err(map_err)?;

        let embedding_sql = match self.api {
            SelectedApi::New => format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                    id TEXT PRIMARY KEY, \
                    collection_id UUID NOT NULL REFERENCES {}(uuid) ON DELETE CASCADE, \
                    text TEXT NOT NULL, \
                    metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb, \
                    embedding vector({})\
                )",
                self.embedding_table, self.collection_table, self.dimension
            ),
            SelectedApi::Legacy => format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                    uuid UUID PRIMARY KEY DEFAULT gen_random_uuid(), \
                    collection_id UUID NOT NULL REFERENCES {}(uuid) ON DELETE CASCADE, \
                    text TEXT NOT NULL, \
                    metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb, \
                    embedding vector({})\
                )",
                self.embedding_table, self.collection_table, self.dimension
            ),
        };
        sqlx::query(&embedding_sql).execute(&self.pool).await.map_err(map_err)?;

        self.ensure_collection().await?;

        debug!(
            collection = %self.collection_name,
            table = %self.embedding_table,
            dimension = self.dimension,
            api = ?self.api,
            "ensured base schema"
        );
        Ok(())
    }

    /// Register the collection row if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<()> {
        let insert_sql = format!(
            "INSERT INTO {} (name) VALUES ($1) ON CONFLICT (name) DO NOTHING",
            self.collection_table
        );
        sqlx::query(&insert_sql)
            .bind(&self.collection_name)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::database("collection registration", e))?;
        Ok(())
    }

    /// Delete the collection and all of its rows. Destructive.
    pub async fn delete_collection(&self) -> Result<()> {
        warn!(collection = %self.collection_name, "deleting collection and all stored vectors");
        let delete_sql = format!("DELETE FROM {} WHERE name = $1", self.collection_table);
        sqlx::query(&delete_sql)
            .bind(&self.collection_name)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::database("collection deletion", e))?;
        Ok(())
    }

    async fn collection_id(&self) -> Result<Uuid> {
        let select_sql = format!("SELECT uuid FROM {} WHERE name = $1", self.collection_table);
        let id: Option<Uuid> = sqlx::query_scalar(&select_sql)
            .bind(&self.collection_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::database("collection lookup", e))?;
        id.ok_or_else(|| StoreError::Database {
            phase: "collection lookup".to_string(),
            message: format!("collection '{}' is not registered", self.collection_name),
        })
    }

    /// Insert one batch of records that all carry precomputed embeddings.
    ///
    /// Runs in a single transaction; returns the number of rows written.
    pub async fn add_embeddings(&self, records: &[DocumentRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        for record in records {
            let len = record.embedding.as_ref().map_or(0, Vec::len);
            if len != self.dimension {
                return Err(self.write_error(format!(
                    "embedding width {len} does not match collection dimension {}",
                    self.dimension
                )));
            }
        }

        let collection_id = self.collection_id().await?;
        let mut tx =
            self.pool.begin().await.map_err(|e| self.write_error(e.to_string()))?;

        let insert_sql = self.insert_sql();
        for record in records {
            let metadata_json =
                serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".to_string());
            // Guaranteed present by the width check above.
            let embedding = record.embedding.as_deref().unwrap_or_default();
            let embedding_str = vector_literal(embedding);

            let query = match self.api {
                SelectedApi::New => sqlx::query(&insert_sql)
                    .bind(Uuid::new_v4().to_string())
                    .bind(collection_id)
                    .bind(&record.text)
                    .bind(&metadata_json)
                    .bind(&embedding_str),
                SelectedApi::Legacy => sqlx::query(&insert_sql)
                    .bind(collection_id)
                    .bind(&record.text)
                    .bind(&metadata_json)
                    .bind(&embedding_str),
            };
            query.execute(&mut *tx).await.map_err(|e| self.write_error(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| self.write_error(e.to_string()))?;

        debug!(collection = %self.collection_name, count = records.len(), "inserted embedding batch");
        Ok(records.len())
    }

    /// Insert one batch of records without embeddings, computing vectors via
    /// the embedder first.
    pub async fn add_texts(
        &self,
        records: &[DocumentRecord],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        let embedded: Vec<DocumentRecord> = records
            .iter()
            .zip(embeddings)
            .map(|(record, embedding)| record.clone().with_embedding(embedding))
            .collect();
        self.add_embeddings(&embedded).await
    }

    /// Return the `k` most similar records to `embedding`.
    ///
    /// `algorithm` defaults to cosine when `None`; `score_threshold`, when
    /// set, filters out hits scoring below it.
    pub async fn similarity_search(
        &self,
        embedding: &[f32],
        k: usize,
        score_threshold: Option<f32>,
        algorithm: Option<DistanceAlgorithm>,
    ) -> Result<Vec<SearchHit>> {
        let algorithm = algorithm.unwrap_or_default();
        let op = algorithm.operator();
        let collection_id = self.collection_id().await?;

        let search_sql = format!(
            "SELECT text, metadata, (embedding {op} $2::vector) AS distance \
             FROM {} \
             WHERE collection_id = $1 \
             ORDER BY embedding {op} $2::vector \
             LIMIT $3",
            self.embedding_table
        );
        let embedding_str = vector_literal(embedding);

        let rows = sqlx::query(&search_sql)
            .bind(collection_id)
            .bind(&embedding_str)
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::database("similarity search", e))?;

        let hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let text: String = row.get("text");
                let distance: f64 = row.get("distance");
                let metadata_value: serde_json::Value = row.get("metadata");
                let metadata = metadata_value.as_object().cloned().unwrap_or_default();
                SearchHit {
                    text,
                    metadata,
                    score: algorithm.distance_to_similarity(distance) as f32,
                }
            })
            .filter(|hit| score_threshold.is_none_or(|t| hit.score >= t))
            .collect();

        info!(collection = %self.collection_name, k, hits = hits.len(), "similarity search completed");
        Ok(hits)
    }

    fn insert_sql(&self) -> String {
        match self.api {
            SelectedApi::New => format!(
                "INSERT INTO {} (id, collection_id, text, metadata, embedding) \
                 VALUES ($1, $2, $3, $4::jsonb, $5::vector)",
                self.embedding_table
            ),
            SelectedApi::Legacy => format!(
                "INSERT INTO {} (collection_id, text, metadata, embedding) \
                 VALUES ($1, $2, $3::jsonb, $4::vector)",
                self.embedding_table
            ),
        }
    }

    fn write_error(&self, message: String) -> StoreError {
        StoreError::StorageWrite { collection: self.collection_name.clone(), message }
    }
}

/// Render a vector in the `'[a,b,c]'` literal form pgvector expects.
fn vector_literal(embedding: &[f32]) -> String {
    format!("[{}]", embedding.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","))
}
