//! Namespaced, tag-indexed cache over interchangeable storage backends.
//!
//! The [`Cache`] facade validates input, computes expiry from its
//! [`Clock`](tagcache_core::Clock) and enforces the freeze state. Backends
//! implement [`StorageAdapter`] and only ever see validated identifiers and
//! an explicit `now`.
//!
//! # Freezing
//!
//! Freezing is one-way for a namespace. The live entries are snapshotted in
//! memory, their expiry is cleared in storage and a marker is persisted so
//! other handles opening the namespace start frozen too. From then on reads
//! are served from the [`FrozenSnapshot`] and every mutation fails with
//! [`CacheError::Frozen`](tagcache_core::CacheError::Frozen). Only
//! [`Cache::purge`] returns the namespace to a live state.
//!
//! # Example
//!
//! ```ignore
//! let adapter = Arc::new(MemoryAdapter::new("pages"));
//! let cache = Cache::open(adapter, CacheOptions::default()).await?;
//!
//! cache.set("home", b"<html>", ["layout", "nav"], None).await?;
//! cache.flush_by_tag("nav").await?;
//! assert!(cache.get("home").await?.is_none());
//! ```

pub mod facade;
pub mod freeze;
pub mod memory_backend;
pub mod namespace_key;
pub mod postgres_backend;
pub mod redis_backend;
pub mod stats;
pub mod traits;

pub use facade::Cache;
pub use freeze::{FreezeController, FrozenSnapshot};
pub use memory_backend::MemoryAdapter;
pub use namespace_key::{KeyKind, NamespaceKeys};
pub use postgres_backend::{create_pool, PostgresAdapter, PostgresAdapterError};
pub use redis_backend::{connection_url, RedisAdapter, RedisAdapterError};
pub use stats::{CacheStats, StatsRecorder};
pub use traits::{EntryStream, GarbageReport, StorageAdapter};
