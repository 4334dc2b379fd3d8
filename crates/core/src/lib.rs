//! `procura-core`: shared domain building blocks for the procurement suite.
//!
//! Pure domain primitives only: identifiers, the domain error model, the
//! aggregate contract and the table binding used by the record store.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod table;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{RecordId, TenantId, UserId};
pub use money::{approx_eq, round_currency, AMOUNT_EPSILON};
pub use table::TableBacked;
