//! Property tests for metadata policy application.

use proptest::prelude::*;
use serde_json::{Map, Value, json};

use pgvector_store::document::{DocumentRecord, EMBEDDING_METADATA_KEY};
use pgvector_store::metadata::{MetadataStrategy, apply_metadata_policy};

/// Generate a small metadata map with lowercase keys and integer values.
fn arb_metadata() -> impl Strategy<Value = Map<String, Value>> {
    proptest::collection::btree_map("[a-e]{1,4}", any::<i64>(), 0..6)
        .prop_map(|m| m.into_iter().map(|(k, v)| (k, json!(v))).collect())
}

/// Generate a document with arbitrary metadata, sometimes carrying the
/// reserved embedding key.
fn arb_document() -> impl Strategy<Value = DocumentRecord> {
    ("[a-z ]{1,30}", arb_metadata(), any::<bool>()).prop_map(|(text, mut metadata, poisoned)| {
        if poisoned {
            metadata.insert(EMBEDDING_METADATA_KEY.to_string(), json!([0.1, 0.2]));
        }
        DocumentRecord::new(text).with_metadata(metadata)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Under `Merge` with preservation, every custom key wins and every
    /// non-conflicting document key survives.
    #[test]
    fn merge_custom_keys_always_win(
        documents in proptest::collection::vec(arb_document(), 1..8),
        custom in arb_metadata(),
    ) {
        let out = apply_metadata_policy(&documents, &custom, true, MetadataStrategy::Merge);
        prop_assert_eq!(out.len(), documents.len());

        for (before, after) in documents.iter().zip(&out) {
            for (key, value) in &custom {
                if key != EMBEDDING_METADATA_KEY {
                    prop_assert_eq!(after.metadata.get(key), Some(value));
                }
            }
            for (key, value) in &before.metadata {
                if key != EMBEDDING_METADATA_KEY && !custom.contains_key(key) {
                    prop_assert_eq!(after.metadata.get(key), Some(value));
                }
            }
        }
    }

    /// The reserved embedding key never survives any strategy, whatever the
    /// inputs contained.
    #[test]
    fn embedding_key_never_persists(
        documents in proptest::collection::vec(arb_document(), 1..8),
        mut custom in arb_metadata(),
        preserve in any::<bool>(),
    ) {
        custom.insert(EMBEDDING_METADATA_KEY.to_string(), json!("smuggled"));

        for strategy in
            [MetadataStrategy::Merge, MetadataStrategy::Replace, MetadataStrategy::DocumentOnly]
        {
            let out = apply_metadata_policy(&documents, &custom, preserve, strategy);
            for record in &out {
                prop_assert!(!record.metadata.contains_key(EMBEDDING_METADATA_KEY));
            }
        }
    }

    /// The policy is pure: text and embeddings pass through untouched and
    /// the input slice is unchanged.
    #[test]
    fn text_and_embeddings_pass_through(
        documents in proptest::collection::vec(arb_document(), 1..8),
        custom in arb_metadata(),
    ) {
        let before = documents.clone();
        let out = apply_metadata_policy(&documents, &custom, false, MetadataStrategy::Replace);

        prop_assert_eq!(&documents, &before);
        for (original, processed) in documents.iter().zip(&out) {
            prop_assert_eq!(&processed.text, &original.text);
            prop_assert_eq!(&processed.embedding, &original.embedding);
        }
    }
}
