//! Infrastructure layer: record storage, command dispatch, configuration,
//! mail delivery and background workers.

pub mod command_dispatcher;
pub mod config;
pub mod mailer;
pub mod numbering;
pub mod repository;
pub mod store;
pub mod workers;

pub use command_dispatcher::{CommandDispatcher, DispatchError, Dispatched, event_payload};
pub use config::{AppConfig, ConfigError};
pub use mailer::{
    ConnectionTestResult, LogMailer, MailError, Mailer, OutboxMailer, OutgoingEmail, SmtpMailer, SmtpTransport,
    build_message, smtp_transport, test_connection,
};
pub use numbering::allocate_po_number;
pub use repository::Versioned;
pub use store::{
    CachedRecordStore, InMemoryRecordStore, PostgresRecordStore, Query, RecordStore, Row, StoreError, StoreResult,
};
