//! Domain events and in-process distribution.
//!
//! Aggregates describe what happened as typed events; the dispatcher wraps
//! them in [`EventEnvelope`]s and publishes them on an [`EventBus`] so that
//! side effects (email notifications) stay out of the command path.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use tenant::TenantScoped;
