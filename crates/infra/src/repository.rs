//! Typed access to [`TableBacked`] rows.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use procura_core::{ExpectedVersion, RecordId, TableBacked, TenantId};

use crate::store::{MAX_LIMIT, Query, RecordStore, Row, StoreResult};

/// A decoded row plus its store metadata.
///
/// Serializes as the record's own fields followed by `row_version`,
/// `created_at` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Versioned<T> {
    #[serde(flatten)]
    pub record: T,
    pub row_version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<T> Versioned<T> {
    pub fn into_inner(self) -> T {
        self.record
    }

    pub fn expected(&self) -> ExpectedVersion {
        ExpectedVersion::Exact(self.row_version)
    }
}

impl<T: DeserializeOwned> TryFrom<Row> for Versioned<T> {
    type Error = crate::store::StoreError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            record: serde_json::from_value(row.data)?,
            row_version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn load<T, S>(store: &S, tenant_id: TenantId, id: RecordId) -> StoreResult<Option<Versioned<T>>>
where
    T: TableBacked + DeserializeOwned,
    S: RecordStore + ?Sized,
{
    store
        .get(tenant_id, T::TABLE, id)
        .await?
        .map(Versioned::try_from)
        .transpose()
}

pub async fn list<T, S>(store: &S, tenant_id: TenantId, query: &Query) -> StoreResult<Vec<Versioned<T>>>
where
    T: TableBacked + DeserializeOwned,
    S: RecordStore + ?Sized,
{
    store
        .query(tenant_id, T::TABLE, query)
        .await?
        .into_iter()
        .map(Versioned::try_from)
        .collect()
}

/// Records only, for the aggregation functions that take plain slices.
///
/// Without an explicit limit every matching row is returned: the store is
/// read page by page until a short page comes back.
pub async fn list_records<T, S>(store: &S, tenant_id: TenantId, query: &Query) -> StoreResult<Vec<T>>
where
    T: TableBacked + DeserializeOwned,
    S: RecordStore + ?Sized,
{
    if query.limit.is_some() {
        return Ok(list(store, tenant_id, query)
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect());
    }

    let mut page = query.clone().limit(MAX_LIMIT);
    let mut records = Vec::new();
    loop {
        let rows = store.query(tenant_id, T::TABLE, &page).await?;
        let fetched = rows.len();
        for row in rows {
            records.push(serde_json::from_value(row.data)?);
        }
        if fetched < MAX_LIMIT {
            return Ok(records);
        }
        page.offset += fetched;
    }
}

pub async fn save<T, S>(
    store: &S,
    tenant_id: TenantId,
    record: T,
    expected: ExpectedVersion,
) -> StoreResult<Versioned<T>>
where
    T: TableBacked + Serialize + Send,
    S: RecordStore + ?Sized,
{
    let data = serde_json::to_value(&record)?;
    let row = store.write(tenant_id, T::TABLE, record.row_id(), data, expected).await?;
    Ok(Versioned {
        record,
        row_version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub async fn remove<T, S>(store: &S, tenant_id: TenantId, id: RecordId) -> StoreResult<()>
where
    T: TableBacked,
    S: RecordStore + ?Sized,
{
    store.delete(tenant_id, T::TABLE, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use procura_budgeting::{BudgetHead, BudgetHeadId, HeadType};

    use crate::store::{InMemoryRecordStore, StoreError};

    fn head(tenant_id: TenantId, code: &str, display_order: i32) -> BudgetHead {
        BudgetHead {
            id: BudgetHeadId::generate(),
            tenant_id,
            name: format!("Head {code}"),
            code: code.to_string(),
            head_type: HeadType::Expenditure,
            parent_id: None,
            display_order,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn typed_round_trip_through_the_store() {
        let store = InMemoryRecordStore::new();
        let tenant = TenantId::new();
        let travel = head(tenant, "TRV", 1);

        let saved = save(&store, tenant, travel.clone(), ExpectedVersion::NoRecord).await.unwrap();
        assert_eq!(saved.row_version, 1);

        let loaded: Versioned<BudgetHead> = load(&store, tenant, travel.id.0).await.unwrap().unwrap();
        assert_eq!(loaded.record, travel);

        let json = serde_json::to_value(&loaded).unwrap();
        assert_eq!(json["code"], "TRV");
        assert_eq!(json["row_version"], 1);

        let heads: Vec<BudgetHead> = list_records(&store, tenant, &Query::new()).await.unwrap();
        assert_eq!(heads, vec![travel]);
    }

    #[tokio::test]
    async fn unbounded_listing_reads_past_one_page() {
        let store = InMemoryRecordStore::new();
        let tenant = TenantId::new();
        let count = MAX_LIMIT + 1;
        for n in 0..count {
            save(&store, tenant, head(tenant, &format!("H{n}"), n as i32), ExpectedVersion::NoRecord)
                .await
                .unwrap();
        }

        let heads: Vec<BudgetHead> = list_records(&store, tenant, &Query::new()).await.unwrap();
        assert_eq!(heads.len(), count);
        let total: i64 = heads.iter().map(|h| i64::from(h.display_order)).sum();
        assert_eq!(total, (0..count as i64).sum::<i64>());

        // An explicit limit is still honoured.
        let first: Vec<BudgetHead> = list_records(&store, tenant, &Query::new().limit(1)).await.unwrap();
        assert_eq!(first.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_order_surfaces_as_unique_violation() {
        let store = InMemoryRecordStore::new();
        let tenant = TenantId::new();
        save(&store, tenant, head(tenant, "A", 4), ExpectedVersion::NoRecord).await.unwrap();

        let err = save(&store, tenant, head(tenant, "B", 4), ExpectedVersion::NoRecord)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(msg) if msg.contains("budget_heads_display_order_key")));
    }
}
