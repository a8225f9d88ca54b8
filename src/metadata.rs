//! Metadata merge policies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::{DocumentRecord, EMBEDDING_METADATA_KEY};

/// How operator-supplied custom metadata and each document's own metadata
/// are combined before persistence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataStrategy {
    /// Start from the document's metadata (when preserved) and overlay the
    /// custom metadata; custom keys win on conflict.
    #[default]
    Merge,
    /// Use the custom metadata only.
    Replace,
    /// Use the document's metadata only; custom metadata is ignored.
    DocumentOnly,
}

/// Apply a metadata policy to every document.
///
/// Pure: the input slice is never mutated. Whatever the strategy, any
/// reserved `embedding` key in the resulting map is removed — embeddings are
/// stored in a dedicated column, not as metadata.
pub fn apply_metadata_policy(
    documents: &[DocumentRecord],
    custom_metadata: &Map<String, Value>,
    preserve_document_metadata: bool,
    strategy: MetadataStrategy,
) -> Vec<DocumentRecord> {
    documents
        .iter()
        .map(|doc| {
            let mut metadata = match strategy {
                MetadataStrategy::Merge => {
                    let mut base = if preserve_document_metadata {
                        doc.metadata.clone()
                    } else {
                        Map::new()
                    };
                    for (key, value) in custom_metadata {
                        base.insert(key.clone(), value.clone());
                    }
                    base
                }
                MetadataStrategy::Replace => custom_metadata.clone(),
                MetadataStrategy::DocumentOnly => doc.metadata.clone(),
            };
            metadata.remove(EMBEDDING_METADATA_KEY);

            DocumentRecord {
                text: doc.text.clone(),
                metadata,
                embedding: doc.embedding.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc_with(metadata: Map<String, Value>) -> DocumentRecord {
        DocumentRecord::new("text").with_metadata(metadata)
    }

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn merge_overlays_custom_over_document() {
        let docs = vec![doc_with(map(&[("a", json!(2)), ("b", json!(3))]))];
        let custom = map(&[("a", json!(1))]);

        let out = apply_metadata_policy(&docs, &custom, true, MetadataStrategy::Merge);
        assert_eq!(out[0].metadata, map(&[("a", json!(1)), ("b", json!(3))]));
    }

    #[test]
    fn merge_without_preserve_drops_document_metadata() {
        let docs = vec![doc_with(map(&[("a", json!(2)), ("b", json!(3))]))];
        let custom = map(&[("a", json!(1))]);

        let out = apply_metadata_policy(&docs, &custom, false, MetadataStrategy::Merge);
        assert_eq!(out[0].metadata, map(&[("a", json!(1))]));
    }

    #[test]
    fn replace_uses_custom_only() {
        let docs = vec![doc_with(map(&[("a", json!(2)), ("b", json!(3))]))];
        let custom = map(&[("a", json!(1))]);

        let out = apply_metadata_policy(&docs, &custom, true, MetadataStrategy::Replace);
        assert_eq!(out[0].metadata, map(&[("a", json!(1))]));
    }

    #[test]
    fn document_only_ignores_custom() {
        let docs = vec![doc_with(map(&[("a", json!(2)), ("b", json!(3))]))];
        let custom = map(&[("a", json!(1))]);

        let out = apply_metadata_policy(&docs, &custom, true, MetadataStrategy::DocumentOnly);
        assert_eq!(out[0].metadata, map(&[("a", json!(2)), ("b", json!(3))]));
    }

    #[test]
    fn embedding_key_is_stripped_under_every_strategy() {
        let docs = vec![doc_with(map(&[("embedding", json!([0.1, 0.2])), ("b", json!(3))]))];
        let custom = map(&[("embedding", json!("custom"))]);

        for strategy in
            [MetadataStrategy::Merge, MetadataStrategy::Replace, MetadataStrategy::DocumentOnly]
        {
            let out = apply_metadata_policy(&docs, &custom, true, strategy);
            assert!(
                !out[0].metadata.contains_key(EMBEDDING_METADATA_KEY),
                "embedding key survived {strategy:?}"
            );
        }
    }

    #[test]
    fn input_documents_are_untouched() {
        let docs = vec![doc_with(map(&[("a", json!(2))]))];
        let custom = map(&[("a", json!(1))]);

        let _ = apply_metadata_policy(&docs, &custom, true, MetadataStrategy::Merge);
        assert_eq!(docs[0].metadata, map(&[("a", json!(2))]));
    }
}
