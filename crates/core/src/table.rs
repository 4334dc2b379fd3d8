//! Binding between a domain type and its record-store table.

use crate::RecordId;

/// A domain type persisted as one row of a named table.
///
/// The row payload is the type's serde representation; `row_id` is the
/// primary key the store files it under.
pub trait TableBacked {
    /// Table name in the record store (e.g. `"budget_allocations"`).
    const TABLE: &'static str;

    fn row_id(&self) -> RecordId;
}
