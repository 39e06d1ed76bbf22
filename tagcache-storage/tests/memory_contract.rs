//! Adapter contract and model-based properties for the in-process adapter.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures_util::TryStreamExt;
use proptest::prelude::*;
use tagcache_storage::{Cache, CacheOptions, MemoryAdapter, StorageAdapter};
use tagcache_test_utils::generators::arb_payload;
use tokio::runtime::Runtime;

async fn memory_adapter(namespace: &str) -> Arc<dyn StorageAdapter> {
    // A small batch forces multi-page scans.
    Arc::new(MemoryAdapter::new(namespace).with_scan_batch_size(7))
}

tagcache_test_utils::adapter_contract_tests!(memory_adapter);

// ============================================================================
// MODEL-BASED PROPERTIES
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Set {
        identifier: String,
        payload: Vec<u8>,
        tags: Vec<String>,
    },
    Remove(String),
    FlushTag(String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // A small key space makes overwrites and shared tags common.
    let identifier = "k[0-4]";
    let tag = "t[0-3]";
    prop_oneof![
        4 => (identifier, arb_payload(), prop::collection::vec(tag, 0..4)).prop_map(
            |(identifier, payload, tags)| Op::Set { identifier, payload, tags }
        ),
        1 => identifier.prop_map(Op::Remove),
        1 => tag.prop_map(Op::FlushTag),
    ]
}

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// The cache agrees with a plain map after any sequence of operations,
    /// and the tag index never references a removed entry.
    #[test]
    fn prop_cache_matches_model(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let cache = Cache::open(Arc::new(MemoryAdapter::new("model")), CacheOptions::default())
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let mut model: BTreeMap<String, (Vec<u8>, BTreeSet<String>)> = BTreeMap::new();

            for op in ops {
                match op {
                    Op::Set { identifier, payload, tags } => {
                        cache.set(&identifier, &payload, &tags, None).await.unwrap();
                        model.insert(identifier, (payload, tags.into_iter().collect()));
                    }
                    Op::Remove(identifier) => {
                        cache.remove(&identifier).await.unwrap();
                        model.remove(&identifier);
                    }
                    Op::FlushTag(tag) => {
                        let expected = model.values().filter(|(_, tags)| tags.contains(&tag)).count();
                        let removed = cache.flush_by_tag(&tag).await.unwrap();
                        prop_assert_eq!(removed, expected as u64);
                        model.retain(|_, (_, tags)| !tags.contains(&tag));
                    }
                }
            }

            let items: Vec<(String, Vec<u8>)> = cache.iterate().try_collect().await.unwrap();
            let expected: Vec<(String, Vec<u8>)> = model
                .iter()
                .map(|(id, (payload, _))| (id.clone(), payload.clone()))
                .collect();
            prop_assert_eq!(items, expected);

            for tag in ["t0", "t1", "t2", "t3"] {
                let found = cache.find_identifiers_by_tag(tag).await.unwrap();
                let expected: BTreeSet<String> = model
                    .iter()
                    .filter(|(_, (_, tags))| tags.contains(tag))
                    .map(|(id, _)| id.clone())
                    .collect();
                prop_assert_eq!(found, expected);
            }
            Ok(())
        })?;
    }
}
