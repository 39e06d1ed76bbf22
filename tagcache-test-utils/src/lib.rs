//! TagCache Test Utilities
//!
//! Shared test infrastructure for the TagCache workspace:
//! - Proptest generators for identifiers, tags and payloads
//! - A contract suite every storage adapter must pass, concurrent checks
//!   included
//! - Tracing setup for tests

pub use tagcache_core::{
    CacheError, CacheOptions, CacheResult, ErrorKind, ManualClock, TagSet,
    DEFAULT_MAX_IDENTIFIER_LENGTH,
};
pub use tagcache_storage::{Cache, GarbageReport, StorageAdapter};

/// Install a test-friendly tracing subscriber, honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache inputs.

    use proptest::prelude::*;

    /// Generate a valid identifier.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_%&-]{1,64}"
    }

    /// Generate a valid tag.
    pub fn arb_tag() -> impl Strategy<Value = String> {
        "[a-z0-9_-]{1,24}"
    }

    /// Generate up to `max` tags, duplicates included.
    pub fn arb_tags(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_tag(), 0..=max)
    }

    /// Generate an arbitrary payload, including empty ones.
    pub fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..512)
    }

    /// Generate a string that is NOT a valid identifier.
    pub fn arb_invalid_identifier() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[a-z]{0,8}[ :/.{}()@][a-z]{0,8}",
            "[a-z]{251,260}",
        ]
    }
}

// ============================================================================
// ADAPTER CONTRACT
// ============================================================================

pub mod contract {
    //! Behaviour every [`StorageAdapter`] must show through the [`Cache`]
    //! facade.
    //!
    //! Each check takes a fresh [`ContractHarness`] on its own namespace, so
    //! suites against shared servers do not interfere. Wire a backend in with
    //! [`adapter_contract_tests!`](crate::adapter_contract_tests).

    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::TryStreamExt;

    use super::*;

    const NO_TAGS: [&str; 0] = [];

    /// A namespace no other test run uses.
    pub fn unique_namespace() -> String {
        format!("contract-{}", uuid::Uuid::now_v7().simple())
    }

    /// A facade over the adapter under test, driven by a manual clock.
    pub struct ContractHarness {
        pub cache: Cache,
        pub clock: ManualClock,
        pub adapter: Arc<dyn StorageAdapter>,
    }

    impl ContractHarness {
        pub async fn open(adapter: Arc<dyn StorageAdapter>) -> Self {
            init_test_tracing();
            let clock = ManualClock::default();
            let cache = Cache::open_with_clock(
                adapter.clone(),
                CacheOptions::default(),
                Arc::new(clock.clone()),
            )
            .await
            .expect("contract cache opens");
            Self {
                cache,
                clock,
                adapter,
            }
        }

        /// A second facade over the same namespace, as another process
        /// would see it.
        pub async fn reopen(&self) -> Cache {
            Cache::open_with_clock(
                self.adapter.clone(),
                CacheOptions::default(),
                Arc::new(self.clock.clone()),
            )
            .await
            .expect("contract cache reopens")
        }

        pub async fn collect(&self) -> Vec<(String, Vec<u8>)> {
            let mut items: Vec<(String, Vec<u8>)> = self
                .cache
                .iterate()
                .try_collect()
                .await
                .expect("iteration succeeds");
            items.sort();
            items
        }

        pub async fn tagged(&self, tag: &str) -> BTreeSet<String> {
            self.cache
                .find_identifiers_by_tag(tag)
                .await
                .expect("tag lookup succeeds")
        }
    }

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn assert_kind<T: std::fmt::Debug>(result: CacheResult<T>, kind: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), kind, "unexpected error: {e}"),
            Ok(value) => panic!("expected {kind:?}, got Ok({value:?})"),
        }
    }

    pub async fn round_trip(h: &ContractHarness) {
        let cache = &h.cache;
        cache.set("page-1", b"<html>", ["layout"], None).await.unwrap();
        cache.set("empty", b"", NO_TAGS, None).await.unwrap();

        assert_eq!(cache.get("page-1").await.unwrap(), Some(b"<html>".to_vec()));
        assert_eq!(cache.get("empty").await.unwrap(), Some(Vec::new()));
        assert!(cache.has("page-1").await.unwrap());
        assert!(!cache.has("missing").await.unwrap());
        assert_eq!(cache.get("missing").await.unwrap(), None);
        assert_eq!(h.tagged("layout").await, ids(&["page-1"]));
    }

    pub async fn overwrite_replaces_tags(h: &ContractHarness) {
        let cache = &h.cache;
        cache.set("a", b"v1", ["t1", "t2"], None).await.unwrap();
        cache.set("a", b"v2", ["t2", "t3"], None).await.unwrap();

        assert_eq!(cache.get("a").await.unwrap(), Some(b"v2".to_vec()));
        assert!(h.tagged("t1").await.is_empty());
        assert_eq!(h.tagged("t2").await, ids(&["a"]));
        assert_eq!(h.tagged("t3").await, ids(&["a"]));
    }

    pub async fn flush_by_tag_cleans_other_tags(h: &ContractHarness) {
        let cache = &h.cache;
        cache.set("a", b"1", ["x", "y"], None).await.unwrap();
        cache.set("b", b"2", ["y"], None).await.unwrap();
        cache.set("c", b"3", ["z"], None).await.unwrap();

        assert_eq!(cache.flush_by_tag("x").await.unwrap(), 1);
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert!(h.tagged("x").await.is_empty());
        assert_eq!(h.tagged("y").await, ids(&["b"]));
        assert_eq!(cache.get("c").await.unwrap(), Some(b"3".to_vec()));

        assert_eq!(cache.flush_by_tag("never-used").await.unwrap(), 0);
    }

    pub async fn expiration_hides_entries(h: &ContractHarness) {
        let cache = &h.cache;
        cache
            .set("short", b"1", ["t"], Some(Duration::from_secs(10)))
            .await
            .unwrap();
        cache.set("forever", b"2", ["t"], Some(Duration::ZERO)).await.unwrap();

        h.clock.advance(Duration::from_secs(9));
        assert!(cache.has("short").await.unwrap());

        h.clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get("short").await.unwrap(), None);
        assert!(!cache.has("short").await.unwrap());
        assert_eq!(h.tagged("t").await, ids(&["forever"]));
        assert_eq!(h.collect().await, vec![("forever".to_string(), b"2".to_vec())]);
    }

    pub async fn freeze_blocks_mutation(h: &ContractHarness) {
        let cache = &h.cache;
        cache
            .set("a", b"1", ["t"], Some(Duration::from_secs(5)))
            .await
            .unwrap();
        cache.freeze().await.unwrap();
        assert!(cache.is_frozen());

        assert_kind(cache.set("b", b"2", ["t"], None).await, ErrorKind::Frozen);
        assert_kind(cache.remove("a").await, ErrorKind::Frozen);
        assert_kind(cache.flush().await, ErrorKind::Frozen);
        assert_kind(cache.flush_by_tag("t").await, ErrorKind::Frozen);

        // Frozen entries outlive their lifetime.
        h.clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(h.tagged("t").await, ids(&["a"]));

        // Freezing again is a no-op.
        cache.freeze().await.unwrap();
        assert_eq!(h.collect().await, vec![("a".to_string(), b"1".to_vec())]);
    }

    pub async fn freeze_persists_across_handles(h: &ContractHarness) {
        let cache = &h.cache;
        cache
            .set("a", b"1", ["t"], Some(Duration::from_secs(5)))
            .await
            .unwrap();
        cache
            .set("gone", b"x", ["t"], Some(Duration::from_secs(1)))
            .await
            .unwrap();
        h.clock.advance(Duration::from_secs(2));
        cache.freeze().await.unwrap();

        h.clock.advance(Duration::from_secs(60));
        let other = h.reopen().await;
        assert!(other.is_frozen());
        assert_eq!(other.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(other.get("gone").await.unwrap(), None);
        assert_kind(other.set("b", b"2", NO_TAGS, None).await, ErrorKind::Frozen);
    }

    pub async fn flush_resets_everything(h: &ContractHarness) {
        let cache = &h.cache;
        cache.set("a", b"1", ["t"], None).await.unwrap();
        cache.set("b", b"2", ["t", "u"], None).await.unwrap();

        cache.flush().await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert!(h.tagged("t").await.is_empty());
        assert!(h.tagged("u").await.is_empty());
        assert!(h.collect().await.is_empty());

        cache.set("a", b"3", NO_TAGS, None).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), Some(b"3".to_vec()));
    }

    pub async fn remove_is_idempotent(h: &ContractHarness) {
        let cache = &h.cache;
        cache.remove("missing").await.unwrap();

        cache.set("a", b"1", ["t"], None).await.unwrap();
        cache.remove("a").await.unwrap();
        cache.remove("a").await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert!(h.tagged("t").await.is_empty());
    }

    pub async fn iteration_is_complete(h: &ContractHarness) {
        let cache = &h.cache;
        let mut expected = Vec::new();
        for i in 0..300 {
            let identifier = format!("entry-{i:03}");
            let payload = format!("payload-{i}").into_bytes();
            cache.set(&identifier, &payload, ["bulk"], None).await.unwrap();
            expected.push((identifier, payload));
        }

        assert_eq!(h.collect().await, expected);
        assert_eq!(h.tagged("bulk").await.len(), 300);
    }

    pub async fn collect_garbage_removes_expired(h: &ContractHarness) {
        let cache = &h.cache;
        cache
            .set("short", b"1", ["t"], Some(Duration::from_secs(1)))
            .await
            .unwrap();
        cache.set("long", b"2", ["t"], None).await.unwrap();
        h.clock.advance(Duration::from_secs(2));

        let report = cache.collect_garbage().await.unwrap();
        assert_eq!(report.expired_entries, 1);
        assert_eq!(h.tagged("t").await, ids(&["long"]));

        let again = cache.collect_garbage().await.unwrap();
        assert_eq!(again, GarbageReport::default());
    }

    pub async fn validation_rejects_before_io(h: &ContractHarness) {
        let cache = &h.cache;
        assert_kind(
            cache.set("bad id", b"1", NO_TAGS, None).await,
            ErrorKind::InvalidIdentifier,
        );
        assert_kind(
            cache.set("ok", b"1", ["bad:tag"], None).await,
            ErrorKind::InvalidTag,
        );
        assert_kind(cache.get("").await, ErrorKind::InvalidIdentifier);
        assert_kind(cache.has("a/b").await, ErrorKind::InvalidIdentifier);
        assert_kind(cache.flush_by_tag("").await, ErrorKind::InvalidTag);
        assert_kind(
            cache.find_identifiers_by_tag("{t}").await,
            ErrorKind::InvalidTag,
        );

        let long = "x".repeat(DEFAULT_MAX_IDENTIFIER_LENGTH + 1);
        assert_kind(cache.remove(&long).await, ErrorKind::InvalidIdentifier);
        assert!(h.collect().await.is_empty());
    }

    pub async fn duplicate_tags_collapse(h: &ContractHarness) {
        let cache = &h.cache;
        cache.set("a", b"1", ["t", "t", "t"], None).await.unwrap();
        assert_eq!(h.tagged("t").await, ids(&["a"]));
        assert_eq!(cache.flush_by_tag("t").await.unwrap(), 1);
    }

    pub async fn purge_unfreezes(h: &ContractHarness) {
        let cache = &h.cache;
        cache.set("a", b"1", ["t"], None).await.unwrap();
        cache.freeze().await.unwrap();

        cache.purge().await.unwrap();
        assert!(!cache.is_frozen());
        assert_eq!(cache.get("a").await.unwrap(), None);
        cache.set("b", b"2", NO_TAGS, None).await.unwrap();

        let other = h.reopen().await;
        assert!(!other.is_frozen());
        assert_eq!(other.get("b").await.unwrap(), Some(b"2".to_vec()));
    }

    pub async fn flush_count_after_collection(h: &ContractHarness) {
        let cache = &h.cache;
        cache
            .set("short", b"1", ["t"], Some(Duration::from_secs(1)))
            .await
            .unwrap();
        cache.set("long", b"2", ["t"], None).await.unwrap();
        h.clock.advance(Duration::from_secs(2));

        // Once collected, every backend counts only the live entry.
        cache.collect_garbage().await.unwrap();
        assert_eq!(cache.flush_by_tag("t").await.unwrap(), 1);
    }

    // ------------------------------------------------------------------
    // Concurrent access
    // ------------------------------------------------------------------

    /// Independent facades over the harness adapter, for racing tasks.
    async fn handles(h: &ContractHarness, count: usize) -> Vec<Arc<Cache>> {
        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            handles.push(Arc::new(h.reopen().await));
        }
        handles
    }

    async fn join_all(tasks: Vec<tokio::task::JoinHandle<CacheResult<()>>>) {
        for task in tasks {
            task.await
                .expect("task does not panic")
                .expect("racing call succeeds");
        }
    }

    pub async fn concurrent_writers_converge(h: &ContractHarness) {
        let writers = handles(h, 4).await;
        for round in 0..8 {
            let mut tasks = Vec::new();
            for (n, cache) in writers.iter().enumerate() {
                let cache = Arc::clone(cache);
                tasks.push(tokio::spawn(async move {
                    let own = format!("writer-{n}");
                    let payload = format!("{round}/{n}");
                    cache
                        .set("shared", payload.as_bytes(), [own.as_str(), "common"], None)
                        .await
                }));
            }
            join_all(tasks).await;

            let payload = h.cache.get("shared").await.unwrap().expect("one write wins");
            let payload = String::from_utf8(payload).expect("utf-8 payload");
            let (written_in, winner) = payload.split_once('/').expect("round/writer payload");
            assert_eq!(written_in, round.to_string());

            // Only the winning write's tags survive.
            for n in 0..writers.len() {
                let expected = if n.to_string() == winner {
                    ids(&["shared"])
                } else {
                    BTreeSet::new()
                };
                assert_eq!(h.tagged(&format!("writer-{n}")).await, expected, "round {round}");
            }
            assert_eq!(h.tagged("common").await, ids(&["shared"]));
        }
    }

    pub async fn deletes_race_with_writes(h: &ContractHarness) {
        let caches = handles(h, 3).await;
        let identifiers: Vec<String> = (0..6).map(|n| format!("item-{n}")).collect();

        for _ in 0..6 {
            let mut tasks = Vec::new();
            for (n, identifier) in identifiers.iter().enumerate() {
                let writer = Arc::clone(&caches[0]);
                let id = identifier.clone();
                tasks.push(tokio::spawn(async move {
                    let own = format!("own-{n}");
                    writer.set(&id, b"v", ["group", own.as_str()], None).await
                }));
                if n % 2 == 0 {
                    let remover = Arc::clone(&caches[1]);
                    let id = identifier.clone();
                    tasks.push(tokio::spawn(async move { remover.remove(&id).await }));
                }
            }
            let flusher = Arc::clone(&caches[2]);
            tasks.push(tokio::spawn(async move {
                flusher.flush_by_tag("group").await.map(|_| ())
            }));
            join_all(tasks).await;

            // Whatever won, an entry and its tag references agree.
            let group = h.tagged("group").await;
            for (n, identifier) in identifiers.iter().enumerate() {
                let live = h.cache.get(identifier).await.unwrap().is_some();
                assert_eq!(group.contains(identifier), live, "{identifier} in group");
                let own = h.tagged(&format!("own-{n}")).await;
                assert_eq!(own.contains(identifier), live, "{identifier} own tag");
            }
        }
    }

    pub async fn garbage_collection_spares_rewrites(h: &ContractHarness) {
        let caches = handles(h, 2).await;
        let identifiers: Vec<String> = (0..16).map(|n| format!("lease-{n}")).collect();
        for identifier in &identifiers {
            h.cache
                .set(identifier, b"old", ["lease"], Some(Duration::from_secs(1)))
                .await
                .unwrap();
        }
        h.clock.advance(Duration::from_secs(2));

        let collector = Arc::clone(&caches[0]);
        let writer = Arc::clone(&caches[1]);
        let rewritten = identifiers.clone();
        join_all(vec![
            tokio::spawn(async move { collector.collect_garbage().await.map(|_| ()) }),
            tokio::spawn(async move {
                for identifier in &rewritten {
                    writer.set(identifier, b"new", ["lease", "renewed"], None).await?;
                }
                Ok::<_, CacheError>(())
            }),
        ])
        .await;

        let all: BTreeSet<String> = identifiers.iter().cloned().collect();
        for identifier in &identifiers {
            assert_eq!(
                h.cache.get(identifier).await.unwrap(),
                Some(b"new".to_vec()),
                "{identifier} lost to garbage collection"
            );
        }
        assert_eq!(h.tagged("renewed").await, all);
        assert_eq!(h.tagged("lease").await, all);
    }
}

/// Generate one `#[tokio::test]` per contract check for an adapter.
///
/// Checks run on a multi-threaded runtime so the concurrent ones race for
/// real; the calling crate needs tokio's `rt-multi-thread` feature.
///
/// `$factory` is an async fn taking the namespace (`&str`) and returning an
/// `Arc<dyn StorageAdapter>` bound to it.
#[macro_export]
macro_rules! adapter_contract_tests {
    ($factory:path) => {
        $crate::adapter_contract_tests!(@checks $factory;
            round_trip,
            overwrite_replaces_tags,
            flush_by_tag_cleans_other_tags,
            expiration_hides_entries,
            freeze_blocks_mutation,
            freeze_persists_across_handles,
            flush_resets_everything,
            remove_is_idempotent,
            iteration_is_complete,
            collect_garbage_removes_expired,
            validation_rejects_before_io,
            duplicate_tags_collapse,
            purge_unfreezes,
            flush_count_after_collection,
            concurrent_writers_converge,
            deletes_race_with_writes,
            garbage_collection_spares_rewrites,
        );
    };
    (@checks $factory:path; $($check:ident),* $(,)?) => {
        $(
            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn $check() {
                let namespace = $crate::contract::unique_namespace();
                let adapter = $factory(&namespace).await;
                let harness = $crate::contract::ContractHarness::open(adapter).await;
                $crate::contract::$check(&harness).await;
            }
        )*
    };
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;
    use tagcache_core::Validator;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_generated_identifiers_validate(id in arb_identifier()) {
            prop_assert!(Validator::default().validate_identifier(&id).is_ok());
        }

        #[test]
        fn prop_generated_tags_validate(tags in arb_tags(8)) {
            for tag in &tags {
                prop_assert!(Validator::default().validate_tag(tag).is_ok());
            }
        }

        #[test]
        fn prop_invalid_identifiers_rejected(id in arb_invalid_identifier()) {
            prop_assert!(Validator::default().validate_identifier(&id).is_err());
        }
    }
}
