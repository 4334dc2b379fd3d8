//! Background workers consuming the event bus.

pub mod event_worker;
pub mod notifications;

pub use event_worker::{EventWorker, WorkerHandle};
pub use notifications::{NotificationError, NotificationHandler, NotificationOutcome, spawn_notification_worker};
