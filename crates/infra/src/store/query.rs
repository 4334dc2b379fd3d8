//! Row queries: field filters, ordering and pagination.
//!
//! Fields name top-level keys of the row's JSON payload. Comparisons follow
//! JSON types: numbers numerically, strings lexicographically, booleans
//! `false < true`. Values of different types never match a range filter.
//!
//! Ordering may also name the row timestamps `created_at` and `updated_at`,
//! which live beside the payload rather than in it.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::Row;

/// Hard cap on page size.
pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// `value` is an array; matches when the field equals any element.
    In,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

/// Row timestamp an [`Order`] can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowTimestamp {
    CreatedAt,
    UpdatedAt,
}

impl RowTimestamp {
    pub fn column(self) -> &'static str {
        match self {
            RowTimestamp::CreatedAt => "created_at",
            RowTimestamp::UpdatedAt => "updated_at",
        }
    }
}

impl Order {
    /// `Some` when this orders by a row timestamp instead of a payload field.
    pub fn timestamp(&self) -> Option<RowTimestamp> {
        match self.field.as_str() {
            "created_at" => Some(RowTimestamp::CreatedAt),
            "updated_at" => Some(RowTimestamp::UpdatedAt),
            _ => None,
        }
    }
}

/// Rows come back ordered by `order`, then by creation time and id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order: Vec<Order>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<JsonValue>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order.push(Order {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT)
    }

    /// Whether a row payload passes every filter.
    pub fn matches(&self, data: &JsonValue) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }

    /// Ordering of two rows under `order` (ties are left to the caller).
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for order in &self.order {
            let ord = match order.timestamp() {
                Some(RowTimestamp::CreatedAt) => a.created_at.cmp(&b.created_at),
                Some(RowTimestamp::UpdatedAt) => a.updated_at.cmp(&b.updated_at),
                None => compare_fields(a.data.get(&order.field), b.data.get(&order.field)),
            };
            let ord = if order.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl Filter {
    pub fn matches(&self, data: &JsonValue) -> bool {
        let field = data.get(&self.field).unwrap_or(&JsonValue::Null);
        match self.op {
            FilterOp::Eq => json_eq(field, &self.value),
            FilterOp::Ne => !json_eq(field, &self.value),
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|values| values.iter().any(|v| json_eq(field, v))),
            FilterOp::Gt => compare_json(field, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(
                compare_json(field, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => compare_json(field, &self.value) == Some(Ordering::Less),
            FilterOp::Lte => matches!(
                compare_json(field, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

/// Numbers compare by value so `1` equals `1.0`.
fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_json(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Missing and null fields sort last in ascending order.
fn compare_fields(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => compare_json(x, y).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use procura_core::RecordId;
    use serde_json::json;

    fn row(data: JsonValue, created_secs_ago: i64) -> Row {
        let created_at = Utc::now() - Duration::seconds(created_secs_ago);
        Row {
            id: RecordId::new(),
            table: "budget_heads".to_string(),
            version: 1,
            data,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn filters_follow_json_types() {
        let row = json!({"status": "draft", "amount": 250, "fiscal_year": "2026"});

        assert!(Query::new().eq("status", "draft").matches(&row));
        assert!(Query::new().eq("amount", 250.0).matches(&row));
        assert!(!Query::new().filter("amount", FilterOp::Gt, 250).matches(&row));
        assert!(Query::new().filter("amount", FilterOp::Gte, 250).matches(&row));
        assert!(Query::new().filter("amount", FilterOp::Lt, 1000.5).matches(&row));
        assert!(Query::new().filter("status", FilterOp::In, json!(["draft", "submitted"])).matches(&row));
        assert!(!Query::new().filter("status", FilterOp::In, json!("draft")).matches(&row));
        // "2026" is a string; comparing with a number never matches.
        assert!(!Query::new().filter("fiscal_year", FilterOp::Gte, 2000).matches(&row));
    }

    #[test]
    fn missing_fields_equal_null() {
        let row = json!({"status": "draft"});
        assert!(Query::new().eq("notes", JsonValue::Null).matches(&row));
        assert!(Query::new().filter("notes", FilterOp::Ne, "x").matches(&row));
    }

    #[test]
    fn ordering_puts_missing_last_and_respects_direction() {
        let q = Query::new().order_by("display_order", false);
        let one = row(json!({"display_order": 1}), 0);
        let two = row(json!({"display_order": 2}), 0);
        let none = row(json!({}), 0);

        assert_eq!(q.compare(&one, &two), Ordering::Less);
        assert_eq!(q.compare(&two, &none), Ordering::Less);

        let desc = Query::new().order_by("display_order", true);
        assert_eq!(desc.compare(&one, &two), Ordering::Greater);
    }

    #[test]
    fn timestamps_order_by_row_metadata() {
        let older = row(json!({"n": 1}), 60);
        let newer = row(json!({"n": 2}), 5);

        let newest_first = Query::new().order_by("created_at", true);
        assert_eq!(newest_first.compare(&newer, &older), Ordering::Less);
        assert_eq!(Query::new().order_by("updated_at", false).compare(&older, &newer), Ordering::Less);
        assert_eq!(Query::new().order_by("n", false).order[0].timestamp(), None);
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(Query::new().effective_limit(), MAX_LIMIT);
        assert_eq!(Query::new().limit(10).effective_limit(), 10);
        assert_eq!(Query::new().limit(1_000_000).effective_limit(), MAX_LIMIT);
    }
}
