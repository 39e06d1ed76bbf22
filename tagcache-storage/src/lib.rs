//! TagCache Storage - Adapters and Cache Facade
//!
//! Storage adapters for the in-process map, PostgreSQL and Redis, plus the
//! [`Cache`] facade that validates, expires and freezes on top of them.

pub mod cache;

pub use cache::{
    connection_url, create_pool, Cache, CacheStats, EntryStream, FreezeController,
    FrozenSnapshot, GarbageReport, KeyKind, MemoryAdapter, NamespaceKeys, PostgresAdapter,
    PostgresAdapterError, RedisAdapter, RedisAdapterError, StorageAdapter,
};

// Re-export the shared types callers need alongside the facade.
pub use tagcache_core::{
    CacheError, CacheOptions, CacheResult, Clock, ErrorKind, KvConfig, ManualClock,
    RelationalConfig, SystemClock, TagCacheConfig,
};
