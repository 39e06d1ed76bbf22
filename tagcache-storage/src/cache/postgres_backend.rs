//! PostgreSQL storage adapter.
//!
//! Three tables share a configurable prefix:
//!
//! - `{prefix}entries(namespace, identifier, payload, expires_at)`
//! - `{prefix}tags(namespace, tag, identifier)`, the tag index
//! - `{prefix}meta(namespace, frozen_at, marker)`, the durable freeze marker
//!
//! Each mutating call runs in one transaction, so a `write` commits its
//! payload and its tag diff together. Expiry is compared against the `now`
//! passed in by the facade, never against the database clock.

use std::collections::BTreeSet;

use async_stream::stream;
use async_trait::async_trait;
use deadpool_postgres::{
    Config, CreatePoolError, ManagerConfig, Object, Pool, PoolConfig, PoolError, RecyclingMethod,
    Runtime,
};
use tagcache_core::{
    is_expired, tag_set, CacheEntry, CacheError, CacheResult, FreezeMarker, RelationalConfig,
    StorageError, TagDiff, TagSet, Timestamp,
};
use tokio_postgres::types::FromSql;
use tokio_postgres::{NoTls, Row};

use super::traits::{EntryStream, GarbageReport, StorageAdapter};

const BACKEND: &str = "postgres";

/// Rows fetched per keyset page during a scan.
const DEFAULT_SCAN_BATCH: i64 = 256;

/// Error type for PostgreSQL adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum PostgresAdapterError {
    /// The pool could not be built from the configuration.
    #[error("Failed to create pool: {0}")]
    CreatePool(#[from] CreatePoolError),

    /// No connection could be checked out in time.
    #[error("Failed to get connection: {0}")]
    Pool(#[from] PoolError),

    /// A statement failed.
    #[error("Query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// A stored row could not be decoded.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Convert PostgresAdapterError to CacheError.
impl From<PostgresAdapterError> for CacheError {
    fn from(e: PostgresAdapterError) -> Self {
        match e {
            PostgresAdapterError::Storage(inner) => CacheError::Storage(inner),
            other => CacheError::Storage(StorageError::unavailable(BACKEND, other)),
        }
    }
}

type PgResult<T> = Result<T, PostgresAdapterError>;

/// Build a connection pool. No connection is opened until first use.
pub fn create_pool(config: &RelationalConfig) -> PgResult<Pool> {
    let mut cfg = Config::new();
    cfg.url = Some(config.dsn.clone());
    if let Some(user) = &config.username {
        cfg.user = Some(user.clone());
    }
    if let Some(password) = &config.password {
        cfg.password = Some(password.clone());
    }

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let mut pool = PoolConfig::new(config.pool_size);
    pool.timeouts.wait = Some(config.connect_timeout);
    pool.timeouts.create = Some(config.connect_timeout);
    cfg.pool = Some(pool);

    Ok(cfg.create_pool(Some(Runtime::Tokio1), NoTls)?)
}

/// Fully qualified table names for one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TableNames {
    entries: String,
    tags: String,
    meta: String,
}

impl TableNames {
    fn new(prefix: &str) -> Self {
        Self {
            entries: format!("{prefix}entries"),
            tags: format!("{prefix}tags"),
            meta: format!("{prefix}meta"),
        }
    }
}

/// Read one column, reporting a type mismatch as corruption of `identifier`.
fn column<'r, T: FromSql<'r>>(row: &'r Row, index: usize, identifier: &str) -> PgResult<T> {
    row.try_get(index)
        .map_err(|e| StorageError::corrupted(identifier, e).into())
}

/// Storage adapter for a PostgreSQL database.
///
/// The caller supplies a ready pool (see [`create_pool`]); the adapter only
/// ever touches rows of its own namespace.
#[derive(Clone)]
pub struct PostgresAdapter {
    pool: Pool,
    namespace: String,
    tables: TableNames,
    scan_batch_size: i64,
}

impl std::fmt::Debug for PostgresAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAdapter")
            .field("namespace", &self.namespace)
            .field("tables", &self.tables)
            .field("pool_size", &self.pool.status().size)
            .finish()
    }
}

impl PostgresAdapter {
    /// Wrap an existing pool.
    ///
    /// `table_prefix` is interpolated into SQL and must already be
    /// validated (see [`RelationalConfig::validate`]).
    pub fn new(pool: Pool, namespace: impl Into<String>, table_prefix: &str) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
            tables: TableNames::new(table_prefix),
            scan_batch_size: DEFAULT_SCAN_BATCH,
        }
    }

    /// Validate the configuration and build a pooled adapter.
    pub fn from_config(config: &RelationalConfig, namespace: &str) -> CacheResult<Self> {
        config.validate()?;
        let pool = create_pool(config)?;
        tracing::info!(
            namespace,
            table_prefix = %config.table_prefix,
            pool_size = config.pool_size,
            "postgres adapter configured"
        );
        Ok(Self::new(pool, namespace, &config.table_prefix))
    }

    pub fn with_scan_batch_size(mut self, batch: usize) -> Self {
        self.scan_batch_size = i64::try_from(batch.max(1)).unwrap_or(DEFAULT_SCAN_BATCH);
        self
    }

    /// Create the tables and indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> CacheResult<()> {
        let TableNames { entries, tags, meta } = &self.tables;
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {entries} (
                namespace TEXT NOT NULL,
                identifier TEXT NOT NULL,
                payload BYTEA NOT NULL,
                expires_at TIMESTAMPTZ NULL,
                PRIMARY KEY (namespace, identifier)
            );
            CREATE INDEX IF NOT EXISTS {entries}_expires_idx
                ON {entries} (namespace, expires_at) WHERE expires_at IS NOT NULL;
            CREATE TABLE IF NOT EXISTS {tags} (
                namespace TEXT NOT NULL,
                tag TEXT NOT NULL,
                identifier TEXT NOT NULL,
                PRIMARY KEY (namespace, tag, identifier)
            );
            CREATE INDEX IF NOT EXISTS {tags}_identifier_idx ON {tags} (namespace, identifier);
            CREATE TABLE IF NOT EXISTS {meta} (
                namespace TEXT PRIMARY KEY,
                frozen_at TIMESTAMPTZ NOT NULL,
                marker JSONB NOT NULL
            );"
        );

        let conn = self.conn().await?;
        conn.batch_execute(&ddl)
            .await
            .map_err(PostgresAdapterError::from)?;
        tracing::info!(namespace = %self.namespace, tables = %entries, "postgres schema ensured");
        Ok(())
    }

    async fn conn(&self) -> PgResult<Object> {
        Ok(self.pool.get().await?)
    }

    async fn write_entry(&self, entry: &CacheEntry) -> PgResult<TagDiff> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        // The upsert takes the entry row lock; the tag rows are read only
        // after it so concurrent writers of one identifier see each other.
        tx.execute(
            &format!(
                "INSERT INTO {} (namespace, identifier, payload, expires_at)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (namespace, identifier)
                 DO UPDATE SET payload = EXCLUDED.payload, expires_at = EXCLUDED.expires_at",
                self.tables.entries
            ),
            &[
                &self.namespace,
                &entry.identifier,
                &entry.payload,
                &entry.expires_at,
            ],
        )
        .await?;

        let rows = tx
            .query(
                &format!(
                    "SELECT tag FROM {} WHERE namespace = $1 AND identifier = $2",
                    self.tables.tags
                ),
                &[&self.namespace, &entry.identifier],
            )
            .await?;
        let mut old_tags = TagSet::new();
        for row in &rows {
            old_tags.insert(column::<String>(row, 0, &entry.identifier)?);
        }
        let diff = TagDiff::between(&old_tags, &entry.tags);

        if !diff.removed.is_empty() {
            let removed: Vec<&str> = diff.removed.iter().map(String::as_str).collect();
            tx.execute(
                &format!(
                    "DELETE FROM {} WHERE namespace = $1 AND identifier = $2 AND tag = ANY($3)",
                    self.tables.tags
                ),
                &[&self.namespace, &entry.identifier, &removed],
            )
            .await?;
        }
        if !diff.added.is_empty() {
            let added: Vec<&str> = diff.added.iter().map(String::as_str).collect();
            tx.execute(
                &format!(
                    "INSERT INTO {} (namespace, identifier, tag)
                     SELECT $1, $2, UNNEST($3::text[])
                     ON CONFLICT DO NOTHING",
                    self.tables.tags
                ),
                &[&self.namespace, &entry.identifier, &added],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(diff)
    }

    async fn read_entry(&self, identifier: &str) -> PgResult<Option<(Vec<u8>, Option<Timestamp>)>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "SELECT payload, expires_at FROM {} WHERE namespace = $1 AND identifier = $2",
                    self.tables.entries
                ),
                &[&self.namespace, &identifier],
            )
            .await?;
        match row {
            Some(row) => Ok(Some((
                column(&row, 0, identifier)?,
                column(&row, 1, identifier)?,
            ))),
            None => Ok(None),
        }
    }

    async fn read_expiry(&self, identifier: &str) -> PgResult<Option<Option<Timestamp>>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "SELECT expires_at FROM {} WHERE namespace = $1 AND identifier = $2",
                    self.tables.entries
                ),
                &[&self.namespace, &identifier],
            )
            .await?;
        row.map(|row| column(&row, 0, identifier)).transpose()
    }

    /// Delete `identifier` only if it is still expired at `now`, so a
    /// concurrent rewrite is never lost.
    async fn delete_if_expired(&self, identifier: &str, now: Timestamp) -> PgResult<bool> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        let deleted = tx
            .execute(
                &format!(
                    "DELETE FROM {} WHERE namespace = $1 AND identifier = $2
                     AND expires_at IS NOT NULL AND expires_at <= $3",
                    self.tables.entries
                ),
                &[&self.namespace, &identifier, &now],
            )
            .await?;
        if deleted > 0 {
            tx.execute(
                &format!(
                    "DELETE FROM {} WHERE namespace = $1 AND identifier = $2",
                    self.tables.tags
                ),
                &[&self.namespace, &identifier],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn delete_entry(&self, identifier: &str) -> PgResult<bool> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        let deleted = tx
            .execute(
                &format!(
                    "DELETE FROM {} WHERE namespace = $1 AND identifier = $2",
                    self.tables.entries
                ),
                &[&self.namespace, &identifier],
            )
            .await?;
        tx.execute(
            &format!(
                "DELETE FROM {} WHERE namespace = $1 AND identifier = $2",
                self.tables.tags
            ),
            &[&self.namespace, &identifier],
        )
        .await?;
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn delete_tagged(&self, tag: &str) -> PgResult<u64> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        let rows = tx
            .query(
                &format!(
                    "SELECT identifier FROM {} WHERE namespace = $1 AND tag = $2",
                    self.tables.tags
                ),
                &[&self.namespace, &tag],
            )
            .await?;
        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            candidates.push(column::<String>(row, 0, tag)?);
        }
        if candidates.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        // Entry rows are locked in identifier order before any tag row is
        // touched, the same order every writer follows.
        tx.execute(
            &format!(
                "SELECT identifier FROM {} WHERE namespace = $1 AND identifier = ANY($2)
                 ORDER BY identifier FOR UPDATE",
                self.tables.entries
            ),
            &[&self.namespace, &candidates],
        )
        .await?;

        // A writer may have retagged a candidate while we waited for its lock.
        let rows = tx
            .query(
                &format!(
                    "SELECT identifier FROM {} WHERE namespace = $1 AND tag = $2
                     AND identifier = ANY($3)",
                    self.tables.tags
                ),
                &[&self.namespace, &tag, &candidates],
            )
            .await?;
        let mut identifiers = Vec::with_capacity(rows.len());
        for row in &rows {
            identifiers.push(column::<String>(row, 0, tag)?);
        }

        let removed = tx
            .execute(
                &format!(
                    "DELETE FROM {} WHERE namespace = $1 AND identifier = ANY($2)",
                    self.tables.entries
                ),
                &[&self.namespace, &identifiers],
            )
            .await?;
        // Every tag of the doomed entries goes, not only `tag`.
        tx.execute(
            &format!(
                "DELETE FROM {} WHERE namespace = $1 AND identifier = ANY($2)",
                self.tables.tags
            ),
            &[&self.namespace, &identifiers],
        )
        .await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn tagged_live(&self, tag: &str, now: Timestamp) -> PgResult<BTreeSet<String>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT t.identifier FROM {tags} t
                     JOIN {entries} e ON e.namespace = t.namespace AND e.identifier = t.identifier
                     WHERE t.namespace = $1 AND t.tag = $2
                     AND (e.expires_at IS NULL OR e.expires_at > $3)",
                    tags = self.tables.tags,
                    entries = self.tables.entries
                ),
                &[&self.namespace, &tag, &now],
            )
            .await?;
        rows.iter().map(|row| column(row, 0, tag)).collect()
    }

    async fn clear_namespace(&self) -> PgResult<()> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        tx.execute(
            &format!(
                "SELECT identifier FROM {} WHERE namespace = $1
                 ORDER BY identifier FOR UPDATE",
                self.tables.entries
            ),
            &[&self.namespace],
        )
        .await?;
        for table in [&self.tables.entries, &self.tables.tags, &self.tables.meta] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE namespace = $1"),
                &[&self.namespace],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn sweep(&self, now: Timestamp) -> PgResult<GarbageReport> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        let expired = tx
            .query(
                &format!(
                    "DELETE FROM {entries} WHERE namespace = $1
                     AND expires_at IS NOT NULL AND expires_at <= $2
                     AND identifier IN (
                         SELECT identifier FROM {entries} WHERE namespace = $1
                         AND expires_at IS NOT NULL AND expires_at <= $2
                         ORDER BY identifier FOR UPDATE
                     )
                     RETURNING identifier",
                    entries = self.tables.entries
                ),
                &[&self.namespace, &now],
            )
            .await?;
        let mut expired_ids = Vec::with_capacity(expired.len());
        for row in &expired {
            expired_ids.push(column::<String>(row, 0, "<expired entry>")?);
        }
        if !expired_ids.is_empty() {
            tx.execute(
                &format!(
                    "DELETE FROM {} WHERE namespace = $1 AND identifier = ANY($2)",
                    self.tables.tags
                ),
                &[&self.namespace, &expired_ids],
            )
            .await?;
        }

        let dangling = tx
            .execute(
                &format!(
                    "DELETE FROM {tags} t WHERE t.namespace = $1
                     AND NOT EXISTS (
                         SELECT 1 FROM {entries} e
                         WHERE e.namespace = t.namespace AND e.identifier = t.identifier
                     )",
                    tags = self.tables.tags,
                    entries = self.tables.entries
                ),
                &[&self.namespace],
            )
            .await?;

        tx.commit().await?;
        Ok(GarbageReport {
            expired_entries: expired_ids.len() as u64,
            dangling_tag_references: dangling,
        })
    }

    /// One keyset page of live entries strictly after `cursor`.
    async fn scan_page(&self, cursor: &str, now: Timestamp) -> PgResult<Vec<(String, Vec<u8>)>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT identifier, payload FROM {} WHERE namespace = $1
                     AND identifier > $2
                     AND (expires_at IS NULL OR expires_at > $3)
                     ORDER BY identifier
                     LIMIT $4",
                    self.tables.entries
                ),
                &[&self.namespace, &cursor, &now, &self.scan_batch_size],
            )
            .await?;

        let mut page = Vec::with_capacity(rows.len());
        for row in &rows {
            let identifier: String = column(row, 0, cursor)?;
            let payload: Vec<u8> = column(row, 1, &identifier)?;
            page.push((identifier, payload));
        }
        Ok(page)
    }

    async fn load(&self, now: Option<Timestamp>) -> PgResult<Vec<CacheEntry>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT e.identifier, e.payload, e.expires_at,
                            ARRAY_AGG(t.tag) FILTER (WHERE t.tag IS NOT NULL)
                     FROM {entries} e
                     LEFT JOIN {tags} t ON t.namespace = e.namespace AND t.identifier = e.identifier
                     WHERE e.namespace = $1
                     AND ($2::timestamptz IS NULL OR e.expires_at IS NULL OR e.expires_at > $2)
                     GROUP BY e.namespace, e.identifier
                     ORDER BY e.identifier",
                    entries = self.tables.entries,
                    tags = self.tables.tags
                ),
                &[&self.namespace, &now],
            )
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let identifier: String = column(row, 0, "<entry>")?;
            let payload: Vec<u8> = column(row, 1, &identifier)?;
            let expires_at: Option<Timestamp> = column(row, 2, &identifier)?;
            let tags: Option<Vec<String>> = column(row, 3, &identifier)?;
            entries.push(CacheEntry::new(
                identifier,
                payload,
                tag_set(tags.unwrap_or_default()),
                expires_at,
            ));
        }
        Ok(entries)
    }

    async fn store_marker(&self, marker: &FreezeMarker, entries: &[CacheEntry]) -> PgResult<()> {
        let marker_json = marker.to_json_value()?;
        let identifiers: Vec<&str> = entries.iter().map(|e| e.identifier.as_str()).collect();

        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        tx.execute(
            &format!(
                "UPDATE {} SET expires_at = NULL WHERE namespace = $1 AND identifier = ANY($2)",
                self.tables.entries
            ),
            &[&self.namespace, &identifiers],
        )
        .await?;
        tx.execute(
            &format!(
                "INSERT INTO {} (namespace, frozen_at, marker) VALUES ($1, $2, $3)
                 ON CONFLICT (namespace)
                 DO UPDATE SET frozen_at = EXCLUDED.frozen_at, marker = EXCLUDED.marker",
                self.tables.meta
            ),
            &[&self.namespace, &marker.frozen_at, &marker_json],
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_marker(&self) -> PgResult<Option<FreezeMarker>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!("SELECT marker FROM {} WHERE namespace = $1", self.tables.meta),
                &[&self.namespace],
            )
            .await?;
        match row {
            Some(row) => {
                let value: serde_json::Value = column(&row, 0, "<freeze marker>")?;
                Ok(Some(FreezeMarker::from_json_value(value)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StorageAdapter for PostgresAdapter {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn write(&self, entry: &CacheEntry, _now: Timestamp) -> CacheResult<()> {
        let diff = self.write_entry(entry).await?;
        tracing::debug!(
            namespace = %self.namespace,
            identifier = %entry.identifier,
            tags_added = diff.added.len(),
            tags_removed = diff.removed.len(),
            "entry written"
        );
        Ok(())
    }

    async fn read(&self, identifier: &str, now: Timestamp) -> CacheResult<Option<Vec<u8>>> {
        let Some((payload, expires_at)) = self.read_entry(identifier).await? else {
            return Ok(None);
        };
        if !is_expired(now, expires_at) {
            return Ok(Some(payload));
        }

        if let Err(e) = self.delete_if_expired(identifier, now).await {
            tracing::warn!(
                namespace = %self.namespace,
                identifier,
                error = %e,
                "failed to delete expired entry"
            );
        }
        Ok(None)
    }

    async fn contains(&self, identifier: &str, now: Timestamp) -> CacheResult<bool> {
        Ok(self
            .read_expiry(identifier)
            .await?
            .is_some_and(|expires_at| !is_expired(now, expires_at)))
    }

    async fn delete(&self, identifier: &str) -> CacheResult<bool> {
        Ok(self.delete_entry(identifier).await?)
    }

    async fn delete_by_tag(&self, tag: &str) -> CacheResult<u64> {
        Ok(self.delete_tagged(tag).await?)
    }

    async fn identifiers_by_tag(
        &self,
        tag: &str,
        now: Timestamp,
    ) -> CacheResult<BTreeSet<String>> {
        Ok(self.tagged_live(tag, now).await?)
    }

    async fn clear(&self) -> CacheResult<()> {
        Ok(self.clear_namespace().await?)
    }

    async fn collect_garbage(&self, now: Timestamp) -> CacheResult<GarbageReport> {
        Ok(self.sweep(now).await?)
    }

    fn scan(&self, now: Timestamp) -> EntryStream<'_> {
        Box::pin(stream! {
            let mut cursor = String::new();
            loop {
                let page = match self.scan_page(&cursor, now).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(CacheError::from(e));
                        break;
                    }
                };
                let exhausted = (page.len() as i64) < self.scan_batch_size;
                if let Some((last, _)) = page.last() {
                    cursor = last.clone();
                }
                for item in page {
                    yield Ok(item);
                }
                if exhausted {
                    break;
                }
            }
        })
    }

    async fn load_entries(&self, now: Option<Timestamp>) -> CacheResult<Vec<CacheEntry>> {
        Ok(self.load(now).await?)
    }

    async fn mark_frozen(&self, marker: &FreezeMarker, entries: &[CacheEntry]) -> CacheResult<()> {
        Ok(self.store_marker(marker, entries).await?)
    }

    async fn frozen_marker(&self) -> CacheResult<Option<FreezeMarker>> {
        Ok(self.fetch_marker().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_table_names() {
        let tables = TableNames::new("tagcache_");
        assert_eq!(tables.entries, "tagcache_entries");
        assert_eq!(tables.tags, "tagcache_tags");
        assert_eq!(tables.meta, "tagcache_meta");
    }

    #[test]
    fn test_decode_errors_map_to_corrupted() {
        let err = CacheError::from(PostgresAdapterError::from(StorageError::corrupted(
            "id", "bad column",
        )));
        assert_eq!(err.kind(), tagcache_core::ErrorKind::Corrupted);
    }

    #[test]
    fn test_pool_is_lazy() {
        // Building the pool must not need a reachable server.
        let config = RelationalConfig {
            dsn: "postgres://127.0.0.1:1/unreachable".to_string(),
            connect_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let adapter = PostgresAdapter::from_config(&config, "ns").expect("pool should build");
        assert_eq!(adapter.namespace(), "ns");
        assert_eq!(adapter.backend_name(), "postgres");
    }

    #[test]
    fn test_rejects_unsafe_prefix() {
        let config = RelationalConfig {
            table_prefix: "x; DROP TABLE y; --".to_string(),
            ..Default::default()
        };
        let err = PostgresAdapter::from_config(&config, "ns").unwrap_err();
        assert_eq!(err.kind(), tagcache_core::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let config = RelationalConfig {
            dsn: "postgres://127.0.0.1:1/unreachable".to_string(),
            connect_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let adapter = PostgresAdapter::from_config(&config, "ns").expect("pool should build");
        let err = adapter
            .contains("id", chrono::Utc::now())
            .await
            .expect_err("no server listens on port 1");
        assert!(err.is_retryable());
    }
}
