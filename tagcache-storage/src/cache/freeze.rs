//! Freeze controller.
//!
//! A namespace moves `Live -> Frozen` once. Freezing collects garbage, loads
//! every live entry, records a durable marker through the adapter and then
//! serves all reads from an immutable in-memory [`FrozenSnapshot`] with no
//! expiry checks and no storage round-trips. Only an administrative purge
//! returns the namespace to `Live`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use tagcache_core::{CacheEntry, CacheResult, FreezeMarker, TagIndex, Timestamp};
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use super::traits::StorageAdapter;

/// Immutable contents of a frozen namespace.
#[derive(Debug)]
pub struct FrozenSnapshot {
    entries: BTreeMap<String, Vec<u8>>,
    tags: TagIndex,
    marker: FreezeMarker,
}

impl FrozenSnapshot {
    pub fn build(marker: FreezeMarker, entries: Vec<CacheEntry>) -> Self {
        let mut tags = TagIndex::new();
        let mut payloads = BTreeMap::new();
        for entry in entries {
            tags.insert(&entry.identifier, &entry.tags);
            payloads.insert(entry.identifier, entry.payload);
        }
        Self {
            entries: payloads,
            tags,
            marker,
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&[u8]> {
        self.entries.get(identifier).map(Vec::as_slice)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn identifiers_by_tag(&self, tag: &str) -> BTreeSet<String> {
        self.tags.identifiers(tag).cloned().unwrap_or_default()
    }

    /// Entries in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(identifier, payload)| (identifier.as_str(), payload.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn marker(&self) -> &FreezeMarker {
        &self.marker
    }
}

#[derive(Debug, Clone)]
enum FreezeState {
    Live,
    Frozen(Arc<FrozenSnapshot>),
}

/// Owns the frozen flag of one facade.
///
/// Transitions are serialized by an async gate so a freeze and a purge can
/// never interleave their storage calls. Reads of the current state never
/// wait on the gate.
#[derive(Debug)]
pub struct FreezeController {
    state: RwLock<FreezeState>,
    gate: Mutex<()>,
}

impl Default for FreezeController {
    fn default() -> Self {
        Self::new()
    }
}

impl FreezeController {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FreezeState::Live),
            gate: Mutex::new(()),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.snapshot().is_some()
    }

    /// The frozen snapshot, if frozen.
    pub fn snapshot(&self) -> Option<Arc<FrozenSnapshot>> {
        let state = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        match &*state {
            FreezeState::Live => None,
            FreezeState::Frozen(snapshot) => Some(Arc::clone(snapshot)),
        }
    }

    /// Hold the transition gate, e.g. while purging.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Freeze the namespace.
    ///
    /// Already frozen is a no-op returning the existing snapshot. A storage
    /// error at any step leaves the controller `Live`.
    pub async fn freeze(
        &self,
        adapter: &dyn StorageAdapter,
        now: Timestamp,
    ) -> CacheResult<Arc<FrozenSnapshot>> {
        let _gate = self.gate.lock().await;
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot);
        }

        let report = adapter.collect_garbage(now).await?;
        let entries = adapter.load_entries(Some(now)).await?;
        let marker = FreezeMarker::new(now, entries.len() as u64);
        adapter.mark_frozen(&marker, &entries).await?;

        let snapshot = Arc::new(FrozenSnapshot::build(marker, entries));
        self.set(FreezeState::Frozen(Arc::clone(&snapshot)));

        info!(
            namespace = adapter.namespace(),
            backend = adapter.backend_name(),
            entries = snapshot.len(),
            expired_collected = report.expired_entries,
            "cache frozen"
        );
        Ok(snapshot)
    }

    /// Sync the in-process state with the durable marker.
    ///
    /// Returns whether the namespace is frozen afterwards.
    pub async fn restore(&self, adapter: &dyn StorageAdapter) -> CacheResult<bool> {
        let _gate = self.gate.lock().await;
        self.restore_locked(adapter).await
    }

    /// [`restore`](Self::restore) for a caller already holding the gate.
    pub async fn restore_locked(&self, adapter: &dyn StorageAdapter) -> CacheResult<bool> {
        match adapter.frozen_marker().await? {
            Some(marker) => {
                if self
                    .snapshot()
                    .is_some_and(|current| current.marker() == &marker)
                {
                    return Ok(true);
                }
                let entries = adapter.load_entries(None).await?;
                info!(
                    namespace = adapter.namespace(),
                    entries = entries.len(),
                    frozen_at = %marker.frozen_at,
                    "attached to frozen cache"
                );
                self.set(FreezeState::Frozen(Arc::new(FrozenSnapshot::build(
                    marker, entries,
                ))));
                Ok(true)
            }
            None => {
                self.set(FreezeState::Live);
                Ok(false)
            }
        }
    }

    /// Return to `Live`. The caller holds the gate and has cleared storage.
    pub fn reset(&self) {
        self.set(FreezeState::Live);
    }

    fn set(&self, next: FreezeState) {
        *self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryAdapter;
    use chrono::{TimeDelta, TimeZone, Utc};
    use tagcache_core::tag_set;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_snapshot_lookup() {
        let entries = vec![
            CacheEntry::new("a", b"1".to_vec(), tag_set(["t"]), None),
            CacheEntry::new("b", b"2".to_vec(), tag_set(["t", "u"]), Some(t0())),
        ];
        let snapshot = FrozenSnapshot::build(FreezeMarker::new(t0(), 2), entries);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("b"), Some(&b"2"[..]));
        assert!(!snapshot.contains("c"));
        assert_eq!(snapshot.identifiers_by_tag("t"), tag_set(["a", "b"]));
        assert_eq!(snapshot.identifiers_by_tag("u"), tag_set(["b"]));
        assert!(snapshot.identifiers_by_tag("none").is_empty());

        let ids: Vec<&str> = snapshot.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_freeze_excludes_expired_and_marks_storage() {
        let adapter = MemoryAdapter::new("ns");
        let soon = t0() + TimeDelta::seconds(1);
        adapter
            .write(&CacheEntry::new("old", b"o".to_vec(), tag_set(["t"]), Some(soon)), t0())
            .await
            .unwrap();
        adapter
            .write(&CacheEntry::new("live", b"l".to_vec(), tag_set(["t"]), Some(soon + TimeDelta::seconds(10))), t0())
            .await
            .unwrap();

        let controller = FreezeController::new();
        let snapshot = controller.freeze(&adapter, soon).await.unwrap();

        assert!(controller.is_frozen());
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains("live"));
        assert_eq!(snapshot.marker().entry_count, 1);
        assert_eq!(adapter.frozen_marker().await.unwrap(), Some(snapshot.marker().clone()));
    }

    #[tokio::test]
    async fn test_freeze_twice_keeps_first_snapshot() {
        let adapter = MemoryAdapter::new("ns");
        let controller = FreezeController::new();
        let first = controller.freeze(&adapter, t0()).await.unwrap();
        let second = controller
            .freeze(&adapter, t0() + TimeDelta::seconds(5))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_restore_follows_marker() {
        let adapter = MemoryAdapter::new("ns");
        let writer = FreezeController::new();
        writer.freeze(&adapter, t0()).await.unwrap();

        let reader = FreezeController::new();
        assert!(reader.restore(&adapter).await.unwrap());
        assert!(reader.is_frozen());

        adapter.clear().await.unwrap();
        assert!(!reader.restore(&adapter).await.unwrap());
        assert!(!reader.is_frozen());
    }
}
