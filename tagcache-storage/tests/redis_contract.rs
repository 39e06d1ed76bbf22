#![cfg(feature = "db-tests")]
//! Adapter contract against a live Redis server.
//!
//! Connection settings come from the `TAGCACHE_REDIS_*` environment variables.

use std::sync::Arc;

use tagcache_storage::{KvConfig, RedisAdapter, StorageAdapter};

async fn redis_adapter(namespace: &str) -> Arc<dyn StorageAdapter> {
    let config = KvConfig {
        // Small pages exercise cursor continuation.
        scan_batch_size: 16,
        ..KvConfig::from_env()
    };
    let adapter = RedisAdapter::connect(&config, namespace)
        .await
        .expect("Failed to connect to Redis");
    Arc::new(adapter)
}

tagcache_test_utils::adapter_contract_tests!(redis_adapter);
