//! Tenant-scoped record store: every entity is one JSON row of a named table.
//!
//! ## Row identity
//!
//! Rows are keyed by `(tenant_id, table, id)`. A tenant can never read or
//! write another tenant's rows because the tenant is part of every key.
//!
//! ## Optimistic concurrency
//!
//! Each row carries a `version` that the store increments on every write.
//! Writers pass an [`ExpectedVersion`]; a mismatch is reported as
//! [`StoreError::Conflict`] and nothing is written.
//!
//! ## Unique constraints
//!
//! The constraints in [`UNIQUE_CONSTRAINTS`] are checked atomically with the
//! write (in-memory: under the write lock; Postgres: partial unique indexes).

pub mod cache;
pub mod memory;
pub mod postgres;
pub mod query;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use procura_core::{ExpectedVersion, RecordId, TenantId};

pub use cache::CachedRecordStore;
pub use memory::InMemoryRecordStore;
pub use postgres::PostgresRecordStore;
pub use query::{Filter, FilterOp, MAX_LIMIT, Order, Query, RowTimestamp};

/// One stored row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub id: RecordId,
    pub table: String,
    pub version: u64,
    pub data: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// Stale or unexpected row version.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// Message is the constraint violation text, reported verbatim.
    #[error("{0}")]
    UniqueViolation(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Serialization(value.to_string())
    }
}

/// A uniqueness rule over top-level fields of one table's rows (per tenant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: &'static str,
    pub table: &'static str,
    pub fields: &'static [&'static str],
}

impl UniqueConstraint {
    /// Violation text, matching what Postgres reports for the same index.
    pub fn violation_message(&self) -> String {
        format!("duplicate key value violates unique constraint \"{}\"", self.name)
    }

    /// Key of `data` under this constraint; `None` when a field is absent or null.
    pub fn key_of(&self, data: &JsonValue) -> Option<Vec<JsonValue>> {
        self.fields
            .iter()
            .map(|f| data.get(*f).filter(|v| !v.is_null()).cloned())
            .collect()
    }
}

/// Must stay in sync with the unique indexes in `migrations/`.
pub const UNIQUE_CONSTRAINTS: &[UniqueConstraint] = &[
    UniqueConstraint {
        name: "budget_heads_display_order_key",
        table: "budget_heads",
        fields: &["head_type", "display_order"],
    },
    UniqueConstraint {
        name: "email_templates_template_key_key",
        table: "email_templates",
        fields: &["template_key"],
    },
];

pub fn constraints_for(table: &str) -> impl Iterator<Item = &'static UniqueConstraint> + '_ {
    UNIQUE_CONSTRAINTS.iter().filter(move |c| c.table == table)
}

/// Table-addressed storage with filtering, ordering and versioned writes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query(&self, tenant_id: TenantId, table: &str, query: &Query) -> StoreResult<Vec<Row>>;

    async fn get(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<Option<Row>>;

    /// Create or replace a row.
    ///
    /// - `NoRecord`: insert; an existing row is a conflict.
    /// - `Exact(v)`: update a row currently at version `v`.
    /// - `Any`: upsert.
    async fn write(
        &self,
        tenant_id: TenantId,
        table: &str,
        id: RecordId,
        data: JsonValue,
        expected: ExpectedVersion,
    ) -> StoreResult<Row>;

    /// Remove a row. Missing rows are reported as `NotFound`.
    async fn delete(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<()>;

    async fn insert(&self, tenant_id: TenantId, table: &str, id: RecordId, data: JsonValue) -> StoreResult<Row> {
        self.write(tenant_id, table, id, data, ExpectedVersion::NoRecord).await
    }

    async fn update(
        &self,
        tenant_id: TenantId,
        table: &str,
        id: RecordId,
        data: JsonValue,
        expected_version: u64,
    ) -> StoreResult<Row> {
        self.write(tenant_id, table, id, data, ExpectedVersion::Exact(expected_version))
            .await
    }
}

#[async_trait]
impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    async fn query(&self, tenant_id: TenantId, table: &str, query: &Query) -> StoreResult<Vec<Row>> {
        (**self).query(tenant_id, table, query).await
    }

    async fn get(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<Option<Row>> {
        (**self).get(tenant_id, table, id).await
    }

    async fn write(
        &self,
        tenant_id: TenantId,
        table: &str,
        id: RecordId,
        data: JsonValue,
        expected: ExpectedVersion,
    ) -> StoreResult<Row> {
        (**self).write(tenant_id, table, id, data, expected).await
    }

    async fn delete(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<()> {
        (**self).delete(tenant_id, table, id).await
    }
}
