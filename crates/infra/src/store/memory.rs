use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;

use procura_core::{ExpectedVersion, RecordId, TenantId};

use super::{Query, RecordStore, Row, StoreError, StoreResult, constraints_for};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TableKey {
    tenant_id: TenantId,
    table: String,
}

/// In-memory record store.
///
/// Intended for tests/dev. Version checks and unique constraints run under
/// one write lock, so concurrent writers cannot both pass a check.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<TableKey, HashMap<RecordId, Row>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tenant_id: TenantId, table: &str) -> TableKey {
        TableKey {
            tenant_id,
            table: table.to_string(),
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

fn check_unique(rows: &HashMap<RecordId, Row>, table: &str, id: RecordId, data: &JsonValue) -> StoreResult<()> {
    for constraint in constraints_for(table) {
        let Some(key) = constraint.key_of(data) else {
            continue;
        };
        let taken = rows
            .values()
            .filter(|row| row.id != id)
            .any(|row| constraint.key_of(&row.data).as_ref() == Some(&key));
        if taken {
            return Err(StoreError::UniqueViolation(constraint.violation_message()));
        }
    }
    Ok(())
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn query(&self, tenant_id: TenantId, table: &str, query: &Query) -> StoreResult<Vec<Row>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let Some(rows) = tables.get(&Self::key(tenant_id, table)) else {
            return Ok(vec![]);
        };

        let mut matched: Vec<&Row> = rows.values().filter(|row| query.matches(&row.data)).collect();
        matched.sort_by(|a, b| {
            query
                .compare(a, b)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(matched
            .into_iter()
            .skip(query.offset)
            .take(query.effective_limit())
            .cloned()
            .collect())
    }

    async fn get(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<Option<Row>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .get(&Self::key(tenant_id, table))
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    async fn write(
        &self,
        tenant_id: TenantId,
        table: &str,
        id: RecordId,
        data: JsonValue,
        expected: ExpectedVersion,
    ) -> StoreResult<Row> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let rows = tables.entry(Self::key(tenant_id, table)).or_default();

        let current = rows.get(&id);
        let actual = current.map(|row| row.version);
        if !expected.matches(actual) {
            return Err(StoreError::Conflict(format!(
                "{table}/{id}: expected {expected:?}, found {actual:?}"
            )));
        }

        check_unique(rows, table, id, &data)?;

        let now = Utc::now();
        let row = Row {
            id,
            table: table.to_string(),
            version: actual.unwrap_or(0) + 1,
            data,
            created_at: current.map(|row| row.created_at).unwrap_or(now),
            updated_at: now,
        };
        rows.insert(id, row.clone());
        Ok(row)
    }

    async fn delete(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        tables
            .get_mut(&Self::key(tenant_id, table))
            .and_then(|rows| rows.remove(&id))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::store::FilterOp;

    fn head(head_type: &str, display_order: i64) -> JsonValue {
        json!({"name": "Head", "head_type": head_type, "display_order": display_order})
    }

    #[tokio::test]
    async fn versions_increment_and_stale_writes_conflict() {
        let store = InMemoryRecordStore::new();
        let tenant = TenantId::new();
        let id = RecordId::new();

        let created = store.insert(tenant, "invoices", id, json!({"n": 1})).await.unwrap();
        assert_eq!(created.version, 1);

        let updated = store.update(tenant, "invoices", id, json!({"n": 2}), 1).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.created_at, created.created_at);

        let stale = store.update(tenant, "invoices", id, json!({"n": 3}), 1).await.unwrap_err();
        assert!(matches!(stale, StoreError::Conflict(_)));

        let duplicate = store.insert(tenant, "invoices", id, json!({})).await.unwrap_err();
        assert!(matches!(duplicate, StoreError::Conflict(_)));

        let row = store.get(tenant, "invoices", id).await.unwrap().unwrap();
        assert_eq!(row.data, json!({"n": 2}));
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let store = InMemoryRecordStore::new();
        let a = TenantId::new();
        let b = TenantId::new();
        let id = RecordId::new();
        store.insert(a, "rfps", id, json!({})).await.unwrap();

        assert_eq!(store.get(b, "rfps", id).await.unwrap(), None);
        assert!(store.query(b, "rfps", &Query::new()).await.unwrap().is_empty());
        assert_eq!(store.delete(b, "rfps", id).await.unwrap_err(), StoreError::NotFound);
    }

    #[tokio::test]
    async fn query_filters_orders_and_pages() {
        let store = InMemoryRecordStore::new();
        let tenant = TenantId::new();
        for (order, head_type) in [(3, "income"), (1, "income"), (2, "expenditure"), (2, "income")] {
            store
                .insert(tenant, "budget_heads", RecordId::new(), head(head_type, order))
                .await
                .unwrap();
        }

        let income = Query::new().eq("head_type", "income").order_by("display_order", false);
        let rows = store.query(tenant, "budget_heads", &income).await.unwrap();
        let orders: Vec<_> = rows.iter().map(|r| r.data["display_order"].clone()).collect();
        assert_eq!(orders, vec![json!(1), json!(2), json!(3)]);

        let page = store
            .query(tenant, "budget_heads", &income.clone().offset(1).limit(1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].data["display_order"], json!(2));

        let high = Query::new().filter("display_order", FilterOp::Gte, 2);
        assert_eq!(store.query(tenant, "budget_heads", &high).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn newest_first_orders_by_creation_time() {
        let store = InMemoryRecordStore::new();
        let tenant = TenantId::new();
        for n in 1..=3 {
            store.insert(tenant, "invoices", RecordId::new(), json!({"n": n})).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let rows = store
            .query(tenant, "invoices", &Query::new().order_by("created_at", true))
            .await
            .unwrap();
        let ns: Vec<_> = rows.iter().map(|r| r.data["n"].clone()).collect();
        assert_eq!(ns, vec![json!(3), json!(2), json!(1)]);
    }

    #[tokio::test]
    async fn duplicate_display_order_is_rejected_verbatim() {
        let store = InMemoryRecordStore::new();
        let tenant = TenantId::new();
        store
            .insert(tenant, "budget_heads", RecordId::new(), head("income", 1))
            .await
            .unwrap();

        // Same order under the other head type is fine.
        store
            .insert(tenant, "budget_heads", RecordId::new(), head("expenditure", 1))
            .await
            .unwrap();

        let err = store
            .insert(tenant, "budget_heads", RecordId::new(), head("income", 1))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::UniqueViolation(
                "duplicate key value violates unique constraint \"budget_heads_display_order_key\"".to_string()
            )
        );

        // Other tenants have their own key space.
        store
            .insert(TenantId::new(), "budget_heads", RecordId::new(), head("income", 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rewriting_a_row_keeps_its_own_unique_key() {
        let store = InMemoryRecordStore::new();
        let tenant = TenantId::new();
        let id = RecordId::new();
        let row = store.insert(tenant, "email_templates", id, json!({"template_key": "po_approved"})).await.unwrap();

        store
            .update(tenant, "email_templates", id, json!({"template_key": "po_approved", "name": "x"}), row.version)
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_inserts_admit_exactly_one() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tenant = TenantId::new();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert(tenant, "budget_heads", RecordId::new(), head("expenditure", 7))
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.query(tenant, "budget_heads", &Query::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_creates_then_replaces() {
        let store = InMemoryRecordStore::new();
        let tenant = TenantId::new();
        let id = RecordId::singleton(tenant);

        let first = store
            .write(tenant, "organization_settings", id, json!({"name": "A"}), ExpectedVersion::Any)
            .await
            .unwrap();
        let second = store
            .write(tenant, "organization_settings", id, json!({"name": "B"}), ExpectedVersion::Any)
            .await
            .unwrap();
        assert_eq!((first.version, second.version), (1, 2));
    }
}
