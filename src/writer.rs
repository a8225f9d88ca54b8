//! Batched write path.
//!
//! The writer picks one of two paths for a run: the bulk path when every
//! document carries a precomputed embedding, or the compute-on-write path
//! when none do, where the embedder is invoked per batch. Mixed inputs are
//! rejected up front rather than written with half-defined semantics. The
//! write is all-or-nothing per call: any failure propagates and no
//! partial-success bookkeeping is attempted.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::StoreConfig;
use crate::document::DocumentRecord;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, StoreError};
use crate::store::PgVectorStore;

/// Terminal status of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    /// The write committed in full.
    Completed,
    /// The write failed; nothing is known about partial state.
    Failed,
}

/// Statistics for one write. Created once per write, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStats {
    /// Number of documents handed to the store.
    pub documents_stored: usize,
    /// Wall-clock duration of the write.
    pub processing_time_seconds: f64,
    /// Documents per second.
    pub storage_rate: f64,
    /// The collection written to.
    pub collection_name: String,
    /// When the write finished.
    pub timestamp: DateTime<Utc>,
    /// Terminal status.
    pub status: WriteStatus,
}

impl StorageStats {
    fn completed(collection_name: &str, documents_stored: usize, elapsed_seconds: f64) -> Self {
        let storage_rate = if elapsed_seconds > 0.0 {
            documents_stored as f64 / elapsed_seconds
        } else {
            0.0
        };
        Self {
            documents_stored,
            processing_time_seconds: elapsed_seconds,
            storage_rate,
            collection_name: collection_name.to_string(),
            timestamp: Utc::now(),
            status: WriteStatus::Completed,
        }
    }
}

/// Which write path a document set takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WritePath {
    /// Every document carries an embedding; hand text+vector pairs straight
    /// to the store.
    Bulk,
    /// No document carries an embedding; the embedder runs per batch.
    ComputeOnWrite,
}

/// Pick the write path, rejecting mixed inputs.
fn select_write_path(collection: &str, documents: &[DocumentRecord]) -> Result<WritePath> {
    let with_embedding = documents.iter().filter(|d| d.has_embedding()).count();
    if with_embedding == documents.len() && !documents.is_empty() {
        Ok(WritePath::Bulk)
    } else if with_embedding == 0 {
        Ok(WritePath::ComputeOnWrite)
    } else {
        Err(StoreError::StorageWrite {
            collection: collection.to_string(),
            message: format!(
                "write mixes documents with and without precomputed embeddings \
                 ({with_embedding} of {} have one)",
                documents.len()
            ),
        })
    }
}

/// Performs the batched write for one orchestration run.
pub struct StorageWriter;

impl StorageWriter {
    /// Write `documents` to the store and return write statistics.
    ///
    /// Honors `pre_delete_collection` (drop and recreate before writing —
    /// destructive) and batches by `config.batch_size`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageWrite`] on mixed embedding inputs or any
    /// failure from the underlying store; the error aborts the run.
    pub async fn write(
        store: &PgVectorStore,
        documents: &[DocumentRecord],
        embedder: &dyn EmbeddingProvider,
        config: &StoreConfig,
    ) -> Result<StorageStats> {
        let collection = store.collection_name();
        let path = select_write_path(collection, documents)?;

        if config.pre_delete_collection {
            warn!(collection, "pre_delete_collection set, dropping existing collection data");
            store.delete_collection().await?;
            store.ensure_collection().await?;
        }

        let start = Instant::now();
        let mut written = 0usize;
        for batch in documents.chunks(config.batch_size) {
            let result = match path {
                WritePath::Bulk => store.add_embeddings(batch).await,
                WritePath::ComputeOnWrite => store.add_texts(batch, embedder).await,
            };
            match result {
                Ok(count) => written += count,
                Err(e) => {
                    error!(collection, written, error = %e, "batched write failed");
                    return Err(e);
                }
            }
        }

        let stats = StorageStats::completed(collection, written, start.elapsed().as_secs_f64());
        info!(
            collection,
            documents = stats.documents_stored,
            rate = stats.storage_rate,
            "write completed"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedded(n: usize) -> Vec<DocumentRecord> {
        (0..n).map(|i| DocumentRecord::new(format!("doc {i}")).with_embedding(vec![0.1; 4])).collect()
    }

    fn plain(n: usize) -> Vec<DocumentRecord> {
        (0..n).map(|i| DocumentRecord::new(format!("doc {i}"))).collect()
    }

    #[test]
    fn all_embedded_takes_bulk_path() {
        assert_eq!(select_write_path("docs", &embedded(3)).unwrap(), WritePath::Bulk);
    }

    #[test]
    fn none_embedded_takes_compute_path() {
        assert_eq!(select_write_path("docs", &plain(3)).unwrap(), WritePath::ComputeOnWrite);
    }

    #[test]
    fn empty_input_takes_compute_path() {
        assert_eq!(select_write_path("docs", &[]).unwrap(), WritePath::ComputeOnWrite);
    }

    #[test]
    fn mixed_input_is_rejected() {
        let mut documents = embedded(2);
        documents.extend(plain(1));
        let err = select_write_path("docs", &documents).unwrap_err();
        assert!(matches!(err, StoreError::StorageWrite { .. }));
    }

    #[test]
    fn empty_embedding_counts_as_absent() {
        let documents = vec![DocumentRecord::new("doc").with_embedding(vec![])];
        assert_eq!(select_write_path("docs", &documents).unwrap(), WritePath::ComputeOnWrite);
    }

    #[test]
    fn completed_stats_compute_rate() {
        let stats = StorageStats::completed("docs", 10, 2.0);
        assert_eq!(stats.status, WriteStatus::Completed);
        assert!((stats.storage_rate - 5.0).abs() < 1e-9);
    }

    #[test]
    fn zero_elapsed_does_not_divide_by_zero() {
        let stats = StorageStats::completed("docs", 10, 0.0);
        assert_eq!(stats.storage_rate, 0.0);
    }

    #[test]
    fn write_status_serializes_snake_case() {
        // Both statuses are part of the serialized stats vocabulary even
        // though a failed write propagates as an error instead of stats.
        assert_eq!(serde_json::to_value(WriteStatus::Completed).unwrap(), "completed");
        assert_eq!(serde_json::to_value(WriteStatus::Failed).unwrap(), "failed");
    }
}
