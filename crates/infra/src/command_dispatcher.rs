//! Command execution pipeline for state-stored aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate row (tenant-scoped)
//!   ↓
//! 2. Handle command (pure decision logic, produces events)
//!   ↓
//! 3. Apply events and write the row back (optimistic version check)
//!   ↓
//! 4. Publish events to the bus (notifications)
//! ```
//!
//! The row is the source of truth; events are not stored. A publish failure
//! is reported after the row has been written and is not retried.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use procura_core::{Aggregate, AggregateRoot, DomainError, ExpectedVersion, RecordId, TableBacked, TenantId};
use procura_events::{Event, EventBus, EventEnvelope};

use crate::repository::Versioned;
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Input failed a field-level check.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Lifecycle rule violated (e.g. approving a draft).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    /// Stale row version or duplicate creation.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{0}")]
    UniqueViolation(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("store failed: {0}")]
    Store(StoreError),
    /// The row was written but publication failed.
    #[error("publish failed: {0}")]
    Publish(String),
}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => DispatchError::NotFound,
            StoreError::Conflict(msg) => DispatchError::Conflict(msg),
            StoreError::UniqueViolation(msg) => DispatchError::UniqueViolation(msg),
            StoreError::Serialization(msg) => DispatchError::Serialization(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Result of a dispatched command: the written row and what was published.
#[derive(Debug, Clone)]
pub struct Dispatched<A> {
    pub record: Versioned<A>,
    pub events: Vec<EventEnvelope<JsonValue>>,
}

/// Reusable command execution engine.
///
/// Generic over the record store `S` and bus `B`, so tests run against
/// `InMemoryRecordStore` and `InMemoryEventBus`.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: RecordStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `command` against the aggregate stored under `record_id`.
    ///
    /// `make_aggregate` builds the empty aggregate when no row exists yet
    /// (creation commands). A command that decides no events leaves the row
    /// untouched. Concurrent writers lose with [`DispatchError::Conflict`];
    /// callers surface that instead of retrying.
    pub async fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        record_id: RecordId,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, RecordId) -> A + Send,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError> + TableBacked + Serialize + DeserializeOwned + Send + Sync,
        A::Command: Send + Sync,
        A::Event: Event + Serialize,
    {
        // 1) Load
        let current = self.store.get(tenant_id, A::TABLE, record_id).await?;
        let (mut aggregate, expected, loaded) = match current {
            Some(row) => {
                let loaded = Versioned::<A>::try_from(row)?;
                let expected = loaded.expected();
                let meta = (loaded.row_version, loaded.created_at, loaded.updated_at);
                (loaded.record, expected, Some(meta))
            }
            None => (make_aggregate(tenant_id, record_id), ExpectedVersion::NoRecord, None),
        };

        // 2) Decide
        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            let Some((row_version, created_at, updated_at)) = loaded else {
                return Err(DispatchError::NotFound);
            };
            return Ok(Dispatched {
                record: Versioned {
                    record: aggregate,
                    row_version,
                    created_at,
                    updated_at,
                },
                events: vec![],
            });
        }

        // 3) Apply + write
        let base_version = aggregate.version();
        for event in &decided {
            aggregate.apply(event);
        }
        let data = serde_json::to_value(&aggregate).map_err(|e| DispatchError::Serialization(e.to_string()))?;
        let row = self.store.write(tenant_id, A::TABLE, record_id, data, expected).await?;

        let envelopes = decided
            .iter()
            .enumerate()
            .map(|(idx, event)| {
                Ok(EventEnvelope::new(
                    Uuid::now_v7(),
                    tenant_id,
                    record_id,
                    A::TABLE,
                    event.event_type(),
                    base_version + idx as u64 + 1,
                    event.occurred_at(),
                    event_payload(event)?,
                ))
            })
            .collect::<Result<Vec<_>, DispatchError>>()?;

        tracing::info!(
            tenant_id = %tenant_id,
            table = A::TABLE,
            record_id = %record_id,
            events = envelopes.len(),
            row_version = row.version,
            "command dispatched"
        );

        // 4) Publish (after write)
        for envelope in &envelopes {
            self.bus
                .publish(envelope.clone())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(Dispatched {
            record: Versioned {
                record: aggregate,
                row_version: row.version,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            events: envelopes,
        })
    }
}

/// Event enums serialize externally tagged (`{"Variant": {...}}`); the
/// envelope already names the event, so its payload is the variant body.
pub fn event_payload<E: Serialize>(event: &E) -> Result<JsonValue, DispatchError> {
    let value = serde_json::to_value(event).map_err(|e| DispatchError::Serialization(e.to_string()))?;
    Ok(match value {
        JsonValue::Object(map) if map.len() == 1 => map
            .into_iter()
            .next()
            .map(|(_, body)| body)
            .unwrap_or(JsonValue::Null),
        other => other,
    })
}
