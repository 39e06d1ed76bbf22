//! In-process storage adapter.
//!
//! Entries live in a `BTreeMap` behind an `RwLock` together with the tag
//! index and the freeze marker. Clones share one store, so several facades
//! built from clones of the same adapter behave like processes sharing one
//! database.
//!
//! # Thread Safety
//!
//! Every operation takes the lock once and releases it before returning.
//! Scans take it once per batch, never across a yield point.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_stream::stream;
use async_trait::async_trait;
use tagcache_core::{
    is_expired, CacheEntry, CacheResult, FreezeMarker, StorageError, TagDiff, TagIndex, TagSet,
    Timestamp,
};
use tracing::debug;

use super::traits::{EntryStream, GarbageReport, StorageAdapter};

const BACKEND: &str = "memory";

/// Entries yielded per lock acquisition during a scan.
const DEFAULT_SCAN_BATCH: usize = 128;

#[derive(Debug, Clone)]
struct StoredEntry {
    payload: Vec<u8>,
    tags: TagSet,
    expires_at: Option<Timestamp>,
}

#[derive(Debug, Default)]
struct MemoryStore {
    entries: BTreeMap<String, StoredEntry>,
    tags: TagIndex,
    frozen: Option<FreezeMarker>,
}

impl MemoryStore {
    /// Remove an entry and unlink it from all of its tags.
    fn remove_entry(&mut self, identifier: &str) -> Option<StoredEntry> {
        let removed = self.entries.remove(identifier)?;
        self.tags.remove_identifier(identifier, &removed.tags);
        Some(removed)
    }
}

/// Storage adapter keeping everything in process memory.
///
/// # Example
///
/// ```ignore
/// use tagcache_storage::{Cache, MemoryAdapter};
/// use tagcache_core::CacheOptions;
///
/// let adapter = MemoryAdapter::new("compiled_metadata");
/// let cache = Cache::open(Arc::new(adapter), CacheOptions::default()).await?;
/// cache.set("Flow_Object_Classes", b"...", ["reflection"], None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    namespace: String,
    store: Arc<RwLock<MemoryStore>>,
    scan_batch_size: usize,
}

impl MemoryAdapter {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            store: Arc::new(RwLock::new(MemoryStore::default())),
            scan_batch_size: DEFAULT_SCAN_BATCH,
        }
    }

    /// Override how many entries a scan reads per lock acquisition.
    pub fn with_scan_batch_size(mut self, batch: usize) -> Self {
        self.scan_batch_size = batch.max(1);
        self
    }

    /// Number of stored entries, expired ones included.
    pub fn stored_len(&self) -> CacheResult<usize> {
        Ok(self.read_store()?.entries.len())
    }

    /// Number of tags present in the index.
    pub fn indexed_tag_count(&self) -> CacheResult<usize> {
        Ok(self.read_store()?.tags.tag_count())
    }

    fn read_store(&self) -> CacheResult<RwLockReadGuard<'_, MemoryStore>> {
        self.store
            .read()
            .map_err(|_| StorageError::unavailable(BACKEND, "lock poisoned").into())
    }

    fn write_store(&self) -> CacheResult<RwLockWriteGuard<'_, MemoryStore>> {
        self.store
            .write()
            .map_err(|_| StorageError::unavailable(BACKEND, "lock poisoned").into())
    }

    /// Remove `identifier` if it is still expired at `now`.
    fn evict_if_expired(&self, identifier: &str, now: Timestamp) -> CacheResult<()> {
        let mut guard = self.write_store()?;
        let expired = guard
            .entries
            .get(identifier)
            .is_some_and(|stored| is_expired(now, stored.expires_at));
        if expired {
            guard.remove_entry(identifier);
            debug!(namespace = %self.namespace, identifier, "evicted expired entry on read");
        }
        Ok(())
    }

    /// One keyset page of live entries after `cursor`, plus the cursor for
    /// the next page when the store may hold more.
    fn scan_page(
        &self,
        cursor: Option<&str>,
        now: Timestamp,
    ) -> CacheResult<(Vec<(String, Vec<u8>)>, Option<String>)> {
        let guard = self.read_store()?;
        let lower = match cursor {
            Some(after) => Bound::Excluded(after),
            None => Bound::Unbounded,
        };

        let mut page = Vec::new();
        let mut last = None;
        let mut visited = 0;
        for (identifier, stored) in guard
            .entries
            .range::<str, _>((lower, Bound::Unbounded))
            .take(self.scan_batch_size)
        {
            visited += 1;
            last = Some(identifier.clone());
            if !is_expired(now, stored.expires_at) {
                page.push((identifier.clone(), stored.payload.clone()));
            }
        }

        let next = if visited == self.scan_batch_size { last } else { None };
        Ok((page, next))
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn write(&self, entry: &CacheEntry, _now: Timestamp) -> CacheResult<()> {
        let mut guard = self.write_store()?;
        let store = &mut *guard;

        let old_tags = store
            .entries
            .get(&entry.identifier)
            .map(|stored| stored.tags.clone())
            .unwrap_or_default();
        let diff = TagDiff::between(&old_tags, &entry.tags);
        store.tags.apply(&entry.identifier, &diff);
        store.entries.insert(
            entry.identifier.clone(),
            StoredEntry {
                payload: entry.payload.clone(),
                tags: entry.tags.clone(),
                expires_at: entry.expires_at,
            },
        );

        debug!(
            namespace = %self.namespace,
            identifier = %entry.identifier,
            tags_added = diff.added.len(),
            tags_removed = diff.removed.len(),
            "entry written"
        );
        Ok(())
    }

    async fn read(&self, identifier: &str, now: Timestamp) -> CacheResult<Option<Vec<u8>>> {
        {
            let guard = self.read_store()?;
            match guard.entries.get(identifier) {
                None => return Ok(None),
                Some(stored) if !is_expired(now, stored.expires_at) => {
                    return Ok(Some(stored.payload.clone()))
                }
                Some(_) => {}
            }
        }
        self.evict_if_expired(identifier, now)?;
        Ok(None)
    }

    async fn contains(&self, identifier: &str, now: Timestamp) -> CacheResult<bool> {
        let guard = self.read_store()?;
        Ok(guard
            .entries
            .get(identifier)
            .is_some_and(|stored| !is_expired(now, stored.expires_at)))
    }

    async fn delete(&self, identifier: &str) -> CacheResult<bool> {
        let mut guard = self.write_store()?;
        Ok(guard.remove_entry(identifier).is_some())
    }

    async fn delete_by_tag(&self, tag: &str) -> CacheResult<u64> {
        let mut guard = self.write_store()?;
        let identifiers = guard.tags.take(tag);

        let mut removed = 0u64;
        for identifier in &identifiers {
            if guard.remove_entry(identifier).is_some() {
                removed += 1;
            }
        }

        debug!(namespace = %self.namespace, tag, removed, "flushed entries by tag");
        Ok(removed)
    }

    async fn identifiers_by_tag(
        &self,
        tag: &str,
        now: Timestamp,
    ) -> CacheResult<BTreeSet<String>> {
        let guard = self.read_store()?;
        let Some(identifiers) = guard.tags.identifiers(tag) else {
            return Ok(BTreeSet::new());
        };
        Ok(identifiers
            .iter()
            .filter(|identifier| {
                guard
                    .entries
                    .get(identifier.as_str())
                    .is_some_and(|stored| !is_expired(now, stored.expires_at))
            })
            .cloned()
            .collect())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut guard = self.write_store()?;
        guard.entries.clear();
        guard.tags.clear();
        guard.frozen = None;
        Ok(())
    }

    async fn collect_garbage(&self, now: Timestamp) -> CacheResult<GarbageReport> {
        let mut guard = self.write_store()?;
        let store = &mut *guard;

        let expired: Vec<String> = store
            .entries
            .iter()
            .filter(|(_, stored)| is_expired(now, stored.expires_at))
            .map(|(identifier, _)| identifier.clone())
            .collect();
        for identifier in &expired {
            store.remove_entry(identifier);
        }

        let entries = &store.entries;
        let dangling = store
            .tags
            .retain_identifiers(|identifier| entries.contains_key(identifier));

        Ok(GarbageReport {
            expired_entries: expired.len() as u64,
            dangling_tag_references: dangling as u64,
        })
    }

    fn scan(&self, now: Timestamp) -> EntryStream<'_> {
        Box::pin(stream! {
            let mut cursor: Option<String> = None;
            loop {
                let (page, next) = match self.scan_page(cursor.as_deref(), now) {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };
                for item in page {
                    yield Ok(item);
                }
                match next {
                    Some(last) => cursor = Some(last),
                    None => break,
                }
            }
        })
    }

    async fn load_entries(&self, now: Option<Timestamp>) -> CacheResult<Vec<CacheEntry>> {
        let guard = self.read_store()?;
        Ok(guard
            .entries
            .iter()
            .filter(|(_, stored)| now.map_or(true, |now| !is_expired(now, stored.expires_at)))
            .map(|(identifier, stored)| {
                CacheEntry::new(
                    identifier.clone(),
                    stored.payload.clone(),
                    stored.tags.clone(),
                    stored.expires_at,
                )
            })
            .collect())
    }

    async fn mark_frozen(&self, marker: &FreezeMarker, entries: &[CacheEntry]) -> CacheResult<()> {
        let mut guard = self.write_store()?;
        for entry in entries {
            if let Some(stored) = guard.entries.get_mut(&entry.identifier) {
                stored.expires_at = None;
            }
        }
        guard.frozen = Some(marker.clone());
        Ok(())
    }

    async fn frozen_marker(&self) -> CacheResult<Option<FreezeMarker>> {
        Ok(self.read_store()?.frozen.clone())
    }
}
