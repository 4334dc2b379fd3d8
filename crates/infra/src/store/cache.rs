//! Query-result cache in front of a [`RecordStore`].
//!
//! Results are keyed by `(tenant, table, query)` and expire after a TTL.
//! Every write or delete drops all cached results for that tenant's table
//! and bumps the table's generation; a query result is only cached when the
//! generation it started under is still current, so a caller always reads
//! its own writes. Expired entries are pruned whenever a result is stored.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use procura_core::{ExpectedVersion, RecordId, TenantId};

use super::{Query, RecordStore, Row, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TableKey {
    tenant_id: TenantId,
    table: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    table: TableKey,
    query: String,
}

#[derive(Debug)]
struct CacheEntry {
    stored_at: Instant,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    generations: HashMap<TableKey, u64>,
}

impl CacheState {
    fn generation(&self, table: &TableKey) -> u64 {
        self.generations.get(table).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct CachedRecordStore<S> {
    inner: S,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl<S> CachedRecordStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of cached query results.
    pub fn cached_queries(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    fn invalidate(&self, table: TableKey) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.retain(|key, _| key.table != table);
            *state.generations.entry(table).or_insert(0) += 1;
        }
    }

    /// A fresh cached result, plus the table generation to store a miss under.
    fn lookup(&self, key: &CacheKey) -> (Option<Vec<Row>>, u64) {
        let Ok(state) = self.state.lock() else {
            return (None, u64::MAX);
        };
        let hit = state
            .entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.rows.clone());
        (hit, state.generation(&key.table))
    }

    fn store(&self, key: CacheKey, generation: u64, rows: &[Row]) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.generation(&key.table) != generation {
            tracing::trace!(table = %key.table.table, "table written during query; result not cached");
            return;
        }
        let ttl = self.ttl;
        state.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        state.entries.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                rows: rows.to_vec(),
            },
        );
    }
}

fn table_key(tenant_id: TenantId, table: &str) -> TableKey {
    TableKey {
        tenant_id,
        table: table.to_string(),
    }
}

#[async_trait]
impl<S> RecordStore for CachedRecordStore<S>
where
    S: RecordStore,
{
    async fn query(&self, tenant_id: TenantId, table: &str, query: &Query) -> StoreResult<Vec<Row>> {
        if self.ttl.is_zero() {
            return self.inner.query(tenant_id, table, query).await;
        }

        let key = CacheKey {
            table: table_key(tenant_id, table),
            query: serde_json::to_string(query)?,
        };
        let (hit, generation) = self.lookup(&key);
        if let Some(rows) = hit {
            tracing::trace!(table, "query cache hit");
            return Ok(rows);
        }

        let rows = self.inner.query(tenant_id, table, query).await?;
        self.store(key, generation, &rows);
        Ok(rows)
    }

    async fn get(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<Option<Row>> {
        self.inner.get(tenant_id, table, id).await
    }

    async fn write(
        &self,
        tenant_id: TenantId,
        table: &str,
        id: RecordId,
        data: JsonValue,
        expected: ExpectedVersion,
    ) -> StoreResult<Row> {
        let result = self.inner.write(tenant_id, table, id, data, expected).await;
        self.invalidate(table_key(tenant_id, table));
        result
    }

    async fn delete(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<()> {
        let result = self.inner.delete(tenant_id, table, id).await;
        self.invalidate(table_key(tenant_id, table));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::store::InMemoryRecordStore;

    #[tokio::test]
    async fn writes_invalidate_the_table() {
        let store = CachedRecordStore::new(InMemoryRecordStore::new(), Duration::from_secs(60));
        let tenant = TenantId::new();
        let all = Query::new();

        assert!(store.query(tenant, "rfps", &all).await.unwrap().is_empty());
        store.query(tenant, "invoices", &all).await.unwrap();
        assert_eq!(store.cached_queries(), 2);

        store.insert(tenant, "rfps", RecordId::new(), json!({})).await.unwrap();
        assert_eq!(store.cached_queries(), 1);
        assert_eq!(store.query(tenant, "rfps", &all).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn results_are_served_until_the_ttl_lapses() {
        let store = CachedRecordStore::new(InMemoryRecordStore::new(), Duration::from_millis(50));
        let tenant = TenantId::new();
        let all = Query::new();
        store.query(tenant, "rfps", &all).await.unwrap();

        // Bypass the cache so it cannot see the write.
        store.inner().insert(tenant, "rfps", RecordId::new(), json!({})).await.unwrap();
        assert!(store.query(tenant, "rfps", &all).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.query(tenant, "rfps", &all).await.unwrap().len(), 1);
    }

    /// Delays every query so a write can land while it is in flight.
    struct SlowQueries {
        inner: InMemoryRecordStore,
        delay: Duration,
    }

    #[async_trait]
    impl RecordStore for SlowQueries {
        async fn query(&self, tenant_id: TenantId, table: &str, query: &Query) -> StoreResult<Vec<Row>> {
            let rows = self.inner.query(tenant_id, table, query).await?;
            tokio::time::sleep(self.delay).await;
            Ok(rows)
        }

        async fn get(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<Option<Row>> {
            self.inner.get(tenant_id, table, id).await
        }

        async fn write(
            &self,
            tenant_id: TenantId,
            table: &str,
            id: RecordId,
            data: JsonValue,
            expected: ExpectedVersion,
        ) -> StoreResult<Row> {
            self.inner.write(tenant_id, table, id, data, expected).await
        }

        async fn delete(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<()> {
            self.inner.delete(tenant_id, table, id).await
        }
    }

    #[tokio::test]
    async fn a_write_during_a_query_keeps_its_result_out_of_the_cache() {
        let store = CachedRecordStore::new(
            SlowQueries {
                inner: InMemoryRecordStore::new(),
                delay: Duration::from_millis(100),
            },
            Duration::from_secs(30),
        );
        let tenant = TenantId::new();
        let all = Query::new();

        let (stale, written) = tokio::join!(store.query(tenant, "rfps", &all), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            store.insert(tenant, "rfps", RecordId::new(), json!({})).await
        });
        assert!(stale.unwrap().is_empty());
        written.unwrap();
        assert_eq!(store.cached_queries(), 0);

        assert_eq!(store.query(tenant, "rfps", &all).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn expired_results_are_pruned_when_new_ones_are_stored() {
        let store = CachedRecordStore::new(InMemoryRecordStore::new(), Duration::from_millis(20));
        let tenant = TenantId::new();
        for offset in 0..5 {
            store.query(tenant, "rfps", &Query::new().offset(offset)).await.unwrap();
        }
        assert_eq!(store.cached_queries(), 5);

        tokio::time::sleep(Duration::from_millis(40)).await;
        store.query(tenant, "invoices", &Query::new()).await.unwrap();
        assert_eq!(store.cached_queries(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let store = CachedRecordStore::new(InMemoryRecordStore::new(), Duration::ZERO);
        store.query(TenantId::new(), "rfps", &Query::new()).await.unwrap();
        assert_eq!(store.cached_queries(), 0);
    }
}
