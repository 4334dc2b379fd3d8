//! Postgres-backed record store.
//!
//! All tables share one `records` relation (see `migrations/`): rows are
//! keyed by `(tenant_id, table_name, id)` and carry their payload as JSONB.
//! Filters and ordering run server-side against `data -> field`.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | StoreError |
//! |------------|---------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` (message verbatim) |
//! | Database (other) | any | `Backend` |
//! | PoolClosed / network / other | n/a | `Backend` |
//!
//! A write whose version check matches no row is reported as `Conflict`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row as _};
use tracing::instrument;
use uuid::Uuid;

use procura_core::{ExpectedVersion, RecordId, TenantId};

use super::{FilterOp, Query, RecordStore, Row, StoreError, StoreResult};

const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_records",
    include_str!("../../migrations/0001_records.sql"),
)];

const RETURNING: &str = "RETURNING id, version, data, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: Arc<PgPool>,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Every statement is idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        for (name, sql) in MIGRATIONS {
            sqlx::raw_sql(sql)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error(name, e))?;
            tracing::info!(migration = name, "migration applied");
        }
        Ok(())
    }
}

/// SQL and text binds for a query's WHERE/ORDER BY tail.
///
/// Field names are always bound as parameters, never spliced into the SQL.
fn build_select(query: &Query) -> (String, Vec<String>, Vec<JsonValue>) {
    // $1 tenant, $2 table; then alternating field/value binds.
    let mut sql = String::from(
        "SELECT id, version, data, created_at, updated_at FROM records \
         WHERE tenant_id = $1 AND table_name = $2",
    );
    let mut fields = Vec::new();
    let mut values = Vec::new();
    let mut next = 3;

    for filter in &query.filters {
        let field = next;
        let value = next + 1;
        next += 2;
        let field_expr = format!("COALESCE(data -> ${field}::text, 'null'::jsonb)");
        let condition = match filter.op {
            FilterOp::Eq => format!("{field_expr} = ${value}"),
            FilterOp::Ne => format!("{field_expr} <> ${value}"),
            FilterOp::In => format!("${value} @> jsonb_build_array({field_expr})"),
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                let op = match filter.op {
                    FilterOp::Gt => ">",
                    FilterOp::Gte => ">=",
                    FilterOp::Lt => "<",
                    _ => "<=",
                };
                format!(
                    "jsonb_typeof({field_expr}) = jsonb_typeof(${value}) \
                     AND jsonb_typeof(${value}) IN ('number', 'string', 'boolean') \
                     AND {field_expr} {op} ${value}"
                )
            }
        };
        sql.push_str(" AND ");
        sql.push_str(&condition);
        fields.push(filter.field.clone());
        values.push(filter.value.clone());
    }

    // Order binds come after all filter binds; timestamps order by column.
    let mut order_sql = Vec::new();
    for order in &query.order {
        let direction = if order.descending { "DESC" } else { "ASC" };
        match order.timestamp() {
            Some(column) => order_sql.push(format!("{} {direction}", column.column())),
            None => {
                order_sql.push(format!("data -> ${next}::text {direction}"));
                fields.push(order.field.clone());
                next += 1;
            }
        }
    }
    order_sql.push("created_at ASC".to_string());
    order_sql.push("id ASC".to_string());

    let limit = next;
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_sql.join(", "));
    sql.push_str(&format!(" LIMIT ${limit} OFFSET ${}", limit + 1));

    (sql, fields, values)
}

fn to_i64(value: u64, what: &str) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::Backend(format!("{what} out of range: {value}")))
}

fn decode_row(table: &str, row: &PgRow) -> StoreResult<Row> {
    let decode = |e: sqlx::Error| StoreError::Backend(format!("failed to decode record row: {e}"));
    let version: i64 = row.try_get("version").map_err(decode)?;
    Ok(Row {
        id: RecordId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        table: table.to_string(),
        version: u64::try_from(version)
            .map_err(|_| StoreError::Backend(format!("negative row version: {version}")))?,
        data: row.try_get::<JsonValue, _>("data").map_err(decode)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(decode)?,
    })
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    #[instrument(skip(self, query), fields(tenant_id = %tenant_id), err)]
    async fn query(&self, tenant_id: TenantId, table: &str, query: &Query) -> StoreResult<Vec<Row>> {
        let (sql, fields, values) = build_select(query);

        let mut q = sqlx::query(&sql).bind(*tenant_id.as_uuid()).bind(table);
        for (field, value) in fields.iter().zip(values.iter()) {
            q = q.bind(field).bind(value);
        }
        for field in &fields[values.len()..] {
            q = q.bind(field);
        }
        q = q
            .bind(to_i64(query.effective_limit() as u64, "limit")?)
            .bind(to_i64(query.offset as u64, "offset")?);

        let rows = q
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("query", e))?;

        rows.iter().map(|row| decode_row(table, row)).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<Option<Row>> {
        let row = sqlx::query(
            r#"
            SELECT id, version, data, created_at, updated_at
            FROM records
            WHERE tenant_id = $1 AND table_name = $2 AND id = $3
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .bind(table)
        .bind(*id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(|r| decode_row(table, r)).transpose()
    }

    #[instrument(skip(self, data), fields(tenant_id = %tenant_id), err)]
    async fn write(
        &self,
        tenant_id: TenantId,
        table: &str,
        id: RecordId,
        data: JsonValue,
        expected: ExpectedVersion,
    ) -> StoreResult<Row> {
        let sql = match expected {
            ExpectedVersion::NoRecord => format!(
                "INSERT INTO records (tenant_id, table_name, id, version, data) \
                 VALUES ($1, $2, $3, 1, $4) \
                 ON CONFLICT (tenant_id, table_name, id) DO NOTHING {RETURNING}"
            ),
            ExpectedVersion::Exact(_) => format!(
                "UPDATE records SET data = $4, version = version + 1, updated_at = now() \
                 WHERE tenant_id = $1 AND table_name = $2 AND id = $3 AND version = $5 {RETURNING}"
            ),
            ExpectedVersion::Any => format!(
                "INSERT INTO records (tenant_id, table_name, id, version, data) \
                 VALUES ($1, $2, $3, 1, $4) \
                 ON CONFLICT (tenant_id, table_name, id) DO UPDATE \
                 SET data = EXCLUDED.data, version = records.version + 1, updated_at = now() {RETURNING}"
            ),
        };

        let mut q = sqlx::query(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(table)
            .bind(*id.as_uuid())
            .bind(&data);
        if let ExpectedVersion::Exact(version) = expected {
            q = q.bind(to_i64(version, "version")?);
        }

        let row = q
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("write", e))?;

        match row {
            Some(row) => decode_row(table, &row),
            None => Err(StoreError::Conflict(format!(
                "{table}/{id}: expected {expected:?}"
            ))),
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete(&self, tenant_id: TenantId, table: &str, id: RecordId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM records WHERE tenant_id = $1 AND table_name = $2 AND id = $3")
            .bind(*tenant_id.as_uuid())
            .bind(table)
            .bind(*id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                StoreError::UniqueViolation(db_err.message().to_string())
            } else {
                StoreError::Backend(format!("database error in {operation}: {}", db_err.message()))
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_binds_fields_as_parameters() {
        let query = Query::new()
            .eq("status", "approved")
            .filter("allocated_amount", FilterOp::Gte, 100)
            .order_by("display_order", true)
            .limit(20);

        let (sql, fields, values) = build_select(&query);

        assert_eq!(fields, vec!["status", "allocated_amount", "display_order"]);
        assert_eq!(values, vec![json!("approved"), json!(100)]);
        assert!(sql.contains("COALESCE(data -> $3::text, 'null'::jsonb) = $4"));
        assert!(sql.contains("COALESCE(data -> $5::text, 'null'::jsonb) >= $6"));
        assert!(sql.contains("ORDER BY data -> $7::text DESC, created_at ASC, id ASC"));
        assert!(sql.ends_with("LIMIT $8 OFFSET $9"));
        assert!(!sql.contains("approved"));
    }

    #[test]
    fn plain_select_orders_by_creation() {
        let (sql, fields, values) = build_select(&Query::new());
        assert!(fields.is_empty() && values.is_empty());
        assert!(sql.ends_with("ORDER BY created_at ASC, id ASC LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn timestamp_order_uses_the_column_without_a_bind() {
        let query = Query::new()
            .eq("rfp_id", "r-1")
            .order_by("created_at", true)
            .order_by("vendor_name", false);

        let (sql, fields, _) = build_select(&query);

        assert_eq!(fields, vec!["rfp_id", "vendor_name"]);
        assert!(sql.contains("ORDER BY created_at DESC, data -> $5::text ASC, created_at ASC, id ASC"));
        assert!(sql.ends_with("LIMIT $6 OFFSET $7"));
    }
}
