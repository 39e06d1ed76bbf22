//! Cache backend facade.
//!
//! [`Cache`] is the single contract callers use regardless of the storage
//! substrate. It validates every identifier and tag before any I/O,
//! resolves lifetimes to absolute expiry, serves reads from the frozen
//! snapshot once frozen, and rejects mutation of a frozen namespace without
//! ever reaching the adapter.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use tagcache_core::{
    tag_set, CacheEntry, CacheError, CacheOptions, CacheResult, Clock, ExpirationPolicy,
    SystemClock, Validator,
};

use super::freeze::FreezeController;
use super::stats::{CacheStats, StatsRecorder};
use super::traits::{EntryStream, GarbageReport, StorageAdapter};

/// A cache namespace bound to one storage adapter.
///
/// # Example
///
/// ```ignore
/// let cache = Cache::open(Arc::new(MemoryAdapter::new("compiled")), CacheOptions::default()).await?;
///
/// cache.set("Flow_Object_Classes", &payload, ["reflection", "classes"], None).await?;
/// assert_eq!(cache.get("Flow_Object_Classes").await?, Some(payload));
///
/// // Build phase done: serve everything from memory from now on.
/// cache.freeze().await?;
/// assert!(cache.set("late", b"x", ["t"], None).await.unwrap_err().is_frozen());
/// ```
pub struct Cache {
    adapter: Arc<dyn StorageAdapter>,
    options: CacheOptions,
    validator: Validator,
    expiration: ExpirationPolicy,
    clock: Arc<dyn Clock>,
    freeze: FreezeController,
    stats: StatsRecorder,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("namespace", &self.adapter.namespace())
            .field("backend", &self.adapter.backend_name())
            .field("options", &self.options)
            .field("frozen", &self.freeze.is_frozen())
            .finish()
    }
}

impl Cache {
    /// Open a namespace using the wall clock.
    pub async fn open(adapter: Arc<dyn StorageAdapter>, options: CacheOptions) -> CacheResult<Self> {
        Self::open_with_clock(adapter, options, Arc::new(SystemClock)).await
    }

    /// Open a namespace with an explicit clock.
    ///
    /// A namespace that another process already froze opens frozen.
    pub async fn open_with_clock(
        adapter: Arc<dyn StorageAdapter>,
        options: CacheOptions,
        clock: Arc<dyn Clock>,
    ) -> CacheResult<Self> {
        options.validate()?;
        let validator = options.validator();
        validator.validate_identifier(adapter.namespace())?;

        let cache = Self {
            expiration: ExpirationPolicy::new(options.default_lifetime),
            adapter,
            options,
            validator,
            clock,
            freeze: FreezeController::new(),
            stats: StatsRecorder::default(),
        };
        cache.freeze.restore(cache.adapter.as_ref()).await?;

        tracing::info!(
            namespace = cache.namespace(),
            backend = cache.backend_name(),
            frozen = cache.is_frozen(),
            "cache opened"
        );
        Ok(cache)
    }

    pub fn namespace(&self) -> &str {
        self.adapter.namespace()
    }

    pub fn backend_name(&self) -> &'static str {
        self.adapter.backend_name()
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Store `payload` under `identifier`, replacing any previous entry.
    ///
    /// `lifetime`: `None` uses the default lifetime, `Some(ZERO)` never
    /// expires.
    ///
    /// The frozen check reads this handle's state only. A freeze done
    /// through another handle or process is seen after
    /// [`refresh_frozen_state`](Self::refresh_frozen_state) or a
    /// [`flush`](Self::flush); until then writes still reach storage.
    pub async fn set<I, S>(
        &self,
        identifier: &str,
        payload: &[u8],
        tags: I,
        lifetime: Option<Duration>,
    ) -> CacheResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.validator.validate_identifier(identifier)?;
        let tags = tag_set(tags);
        self.validator.validate_tags(&tags)?;
        self.ensure_live()?;

        let now = self.clock.now();
        let entry = CacheEntry::new(
            identifier,
            payload,
            tags,
            self.expiration.compute_expiry(now, lifetime),
        );
        self.adapter.write(&entry, now).await?;
        self.stats.record_write();
        Ok(())
    }

    /// Payload of a live entry.
    pub async fn get(&self, identifier: &str) -> CacheResult<Option<Vec<u8>>> {
        self.validator.validate_identifier(identifier)?;

        let payload = match self.freeze.snapshot() {
            Some(snapshot) => snapshot.get(identifier).map(<[u8]>::to_vec),
            None => self.adapter.read(identifier, self.clock.now()).await?,
        };
        self.stats.record_lookup(payload.is_some());
        Ok(payload)
    }

    pub async fn has(&self, identifier: &str) -> CacheResult<bool> {
        self.validator.validate_identifier(identifier)?;

        match self.freeze.snapshot() {
            Some(snapshot) => Ok(snapshot.contains(identifier)),
            None => self.adapter.contains(identifier, self.clock.now()).await,
        }
    }

    /// Remove an entry. Removing a missing entry succeeds.
    pub async fn remove(&self, identifier: &str) -> CacheResult<()> {
        self.validator.validate_identifier(identifier)?;
        self.ensure_live()?;

        if self.adapter.delete(identifier).await? {
            self.stats.record_removals(1);
        }
        Ok(())
    }

    /// Remove every entry and the whole tag index.
    ///
    /// Rejected once frozen, including by a freeze another handle made
    /// since this one opened; see [`purge`](Self::purge).
    pub async fn flush(&self) -> CacheResult<()> {
        let _gate = self.freeze.lock().await;
        self.freeze.restore_locked(self.adapter.as_ref()).await?;
        self.ensure_live()?;

        self.adapter.clear().await?;
        tracing::info!(namespace = self.namespace(), "cache flushed");
        Ok(())
    }

    /// Remove every entry tagged `tag`. Returns how many were removed.
    pub async fn flush_by_tag(&self, tag: &str) -> CacheResult<u64> {
        self.validator.validate_tag(tag)?;
        self.ensure_live()?;

        let removed = self.adapter.delete_by_tag(tag).await?;
        self.stats.record_removals(removed);
        tracing::debug!(namespace = self.namespace(), tag, removed, "flushed by tag");
        Ok(removed)
    }

    /// Live identifiers tagged `tag`, in no particular order.
    pub async fn find_identifiers_by_tag(&self, tag: &str) -> CacheResult<BTreeSet<String>> {
        self.validator.validate_tag(tag)?;

        match self.freeze.snapshot() {
            Some(snapshot) => Ok(snapshot.identifiers_by_tag(tag)),
            None => {
                self.adapter
                    .identifiers_by_tag(tag, self.clock.now())
                    .await
            }
        }
    }

    /// Freeze the namespace. Freezing a frozen namespace is a no-op.
    ///
    /// Other handles already open on the namespace keep their own state:
    /// their `set`, `remove` and `flush_by_tag` are only rejected once they
    /// call [`refresh_frozen_state`](Self::refresh_frozen_state).
    pub async fn freeze(&self) -> CacheResult<()> {
        self.freeze
            .freeze(self.adapter.as_ref(), self.clock.now())
            .await
            .map(|_| ())
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze.is_frozen()
    }

    /// Reclaim space held by expired entries and dangling tag references.
    ///
    /// Frozen entries never expire, so a frozen namespace has nothing to
    /// collect.
    pub async fn collect_garbage(&self) -> CacheResult<GarbageReport> {
        if self.is_frozen() {
            return Ok(GarbageReport::default());
        }

        let report = self.adapter.collect_garbage(self.clock.now()).await?;
        if !report.is_empty() {
            tracing::info!(
                namespace = self.namespace(),
                expired = report.expired_entries,
                dangling = report.dangling_tag_references,
                "garbage collected"
            );
        }
        Ok(report)
    }

    /// Start a fresh traversal of every live entry.
    pub fn iterate(&self) -> EntryStream<'_> {
        match self.freeze.snapshot() {
            Some(snapshot) => Box::pin(stream! {
                for (identifier, payload) in snapshot.iter() {
                    yield Ok::<_, CacheError>((identifier.to_string(), payload.to_vec()));
                }
            }),
            None => self.adapter.scan(self.clock.now()),
        }
    }

    /// Administrative flush that also unfreezes the namespace.
    pub async fn purge(&self) -> CacheResult<()> {
        let _gate = self.freeze.lock().await;
        let was_frozen = self.is_frozen();

        self.adapter.clear().await?;
        self.freeze.reset();
        tracing::info!(namespace = self.namespace(), was_frozen, "cache purged");
        Ok(())
    }

    /// Re-read the durable freeze marker, picking up a freeze or purge done
    /// by another process. Returns whether the namespace is frozen.
    pub async fn refresh_frozen_state(&self) -> CacheResult<bool> {
        self.freeze.restore(self.adapter.as_ref()).await
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.is_frozen())
    }

    fn ensure_live(&self) -> CacheResult<()> {
        if self.freeze.is_frozen() {
            return Err(CacheError::Frozen {
                namespace: self.namespace().to_string(),
            });
        }
        Ok(())
    }
}
