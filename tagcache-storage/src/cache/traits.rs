//! Storage adapter trait.
//!
//! This module defines the contract every storage substrate implements. The
//! facade guarantees that identifiers and tags reaching an adapter are
//! already validated and that no mutating call arrives while the namespace
//! is frozen, so adapters only deal with storage.

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tagcache_core::{CacheEntry, CacheResult, FreezeMarker, Timestamp};

/// Lazy, finite traversal of `(identifier, payload)` pairs.
///
/// Storage errors hit mid-traversal are yielded as `Err` items.
pub type EntryStream<'a> = BoxStream<'a, CacheResult<(String, Vec<u8>)>>;

/// What a garbage collection pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GarbageReport {
    /// Expired entries deleted (with all their tag associations).
    pub expired_entries: u64,
    /// Tag index references to entries that no longer exist.
    pub dangling_tag_references: u64,
}

impl GarbageReport {
    pub fn is_empty(&self) -> bool {
        self.expired_entries == 0 && self.dangling_tag_references == 0
    }
}

/// Storage adapter for one cache namespace.
///
/// Every adapter instance is bound to exactly one namespace at construction.
/// Several instances may talk to the same physical store and namespace
/// concurrently; there is no cross-call isolation and the last completed
/// write wins.
///
/// # Time
///
/// Adapters never read the wall clock. Every call that needs to decide
/// expiry receives `now` from the facade and evaluates it with
/// [`tagcache_core::is_expired`].
///
/// # Errors
///
/// Driver failures are reported, never turned into a miss. Unreachable or
/// timed out stores map to `StorageError::Unavailable`, records that cannot
/// be decoded map to `StorageError::Corrupted`.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Short name used in logs and error messages.
    fn backend_name(&self) -> &'static str;

    /// The namespace this adapter is bound to.
    fn namespace(&self) -> &str;

    /// Replace any entry stored under `entry.identifier`.
    ///
    /// Old tags are diffed against the new set so only the delta touches
    /// the tag index. Writing the same entry twice leaves the same state.
    async fn write(&self, entry: &CacheEntry, now: Timestamp) -> CacheResult<()>;

    /// Payload of a live entry. Expired entries read as `None` and may be
    /// deleted opportunistically along with their tag associations.
    async fn read(&self, identifier: &str, now: Timestamp) -> CacheResult<Option<Vec<u8>>>;

    /// Whether a live entry exists. Never more expensive than [`read`](Self::read).
    async fn contains(&self, identifier: &str, now: Timestamp) -> CacheResult<bool>;

    /// Delete an entry and all its tag associations. Returns whether
    /// something was deleted.
    async fn delete(&self, identifier: &str) -> CacheResult<bool>;

    /// Delete every entry carrying `tag`, expired or not, removing each from
    /// all of its other tags too. Returns the number of entries removed.
    ///
    /// The count covers records the backend still held. Memory and
    /// PostgreSQL keep an expired entry until garbage collection and count
    /// it; Redis drops it at its native expiry and does not. The same
    /// sequence of calls can therefore report a higher count on the first
    /// two than on Redis. Callers needing exact numbers should run
    /// [`collect_garbage`](Self::collect_garbage) first.
    async fn delete_by_tag(&self, tag: &str) -> CacheResult<u64>;

    /// Live identifiers indexed under `tag`.
    async fn identifiers_by_tag(&self, tag: &str, now: Timestamp)
        -> CacheResult<BTreeSet<String>>;

    /// Delete every entry, the whole tag index and the durable freeze marker.
    async fn clear(&self) -> CacheResult<()>;

    /// Best-effort removal of expired entries and dangling tag references.
    async fn collect_garbage(&self, now: Timestamp) -> CacheResult<GarbageReport>;

    /// Start a fresh traversal of live entries. No identifier is yielded
    /// twice within one traversal.
    fn scan(&self, now: Timestamp) -> EntryStream<'_>;

    /// Load entries with their tags. `Some(now)` skips expired entries,
    /// `None` loads everything stored.
    async fn load_entries(&self, now: Option<Timestamp>) -> CacheResult<Vec<CacheEntry>>;

    /// Durably record the freeze.
    ///
    /// `entries` is the snapshot being frozen: adapters make them
    /// non-expiring in storage so other processes attaching later see the
    /// same contents.
    async fn mark_frozen(&self, marker: &FreezeMarker, entries: &[CacheEntry]) -> CacheResult<()>;

    /// The durable freeze marker, if the namespace is frozen.
    async fn frozen_marker(&self) -> CacheResult<Option<FreezeMarker>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_report_is_empty() {
        assert!(GarbageReport::default().is_empty());
        assert!(!GarbageReport {
            expired_entries: 1,
            dangling_tag_references: 0,
        }
        .is_empty());
    }
}
