//! Infrastructure wiring: record store, event bus, dispatcher and mailer.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use procura_core::{Aggregate, DomainError, ExpectedVersion, RecordId, TableBacked, TenantId};
use procura_events::{Event, EventEnvelope, InMemoryEventBus};
use procura_infra::{
    CachedRecordStore, CommandDispatcher, DispatchError, Dispatched, InMemoryRecordStore, LogMailer, Mailer,
    PostgresRecordStore, Query, RecordStore, SmtpMailer, StoreError, Versioned, allocate_po_number, repository,
};
use procura_infra::config::AppConfig;

pub type SharedStore = Arc<dyn RecordStore>;
pub type SharedBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

type Dispatcher = CommandDispatcher<SharedStore, SharedBus>;

pub struct AppServices {
    dispatcher: Dispatcher,
    mailer: Arc<dyn Mailer>,
    smtp_timeout: Duration,
}

impl AppServices {
    pub fn new(store: SharedStore, bus: SharedBus, mailer: Arc<dyn Mailer>, smtp_timeout: Duration) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            mailer,
            smtp_timeout,
        }
    }

    /// Dev/test wiring: everything in process, nothing persisted.
    pub fn in_memory(mailer: Arc<dyn Mailer>) -> Self {
        Self::new(
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(InMemoryEventBus::new()),
            mailer,
            Duration::from_secs(5),
        )
    }

    pub fn store(&self) -> &dyn RecordStore {
        &**self.dispatcher.store()
    }

    pub fn shared_store(&self) -> SharedStore {
        self.dispatcher.store().clone()
    }

    pub fn bus(&self) -> &SharedBus {
        self.dispatcher.bus()
    }

    pub fn mailer(&self) -> &dyn Mailer {
        &*self.mailer
    }

    pub fn shared_mailer(&self) -> Arc<dyn Mailer> {
        self.mailer.clone()
    }

    pub fn smtp_timeout(&self) -> Duration {
        self.smtp_timeout
    }

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
        self.dispatcher
            .dispatch(tenant_id, record_id, command, make_aggregate)
            .await
    }

    pub async fn find<T>(&self, tenant_id: TenantId, id: RecordId) -> Result<Option<Versioned<T>>, DispatchError>
    where
        T: TableBacked + DeserializeOwned,
    {
        Ok(repository::load::<T, _>(self.store(), tenant_id, id).await?)
    }

    /// Like [`find`](Self::find), with a missing row reported as `NotFound`.
    pub async fn get<T>(&self, tenant_id: TenantId, id: RecordId) -> Result<Versioned<T>, DispatchError>
    where
        T: TableBacked + DeserializeOwned,
    {
        self.find(tenant_id, id).await?.ok_or(DispatchError::NotFound)
    }

    pub async fn list<T>(&self, tenant_id: TenantId, query: &Query) -> Result<Vec<Versioned<T>>, DispatchError>
    where
        T: TableBacked + DeserializeOwned,
    {
        Ok(repository::list::<T, _>(self.store(), tenant_id, query).await?)
    }

    pub async fn records<T>(&self, tenant_id: TenantId, query: &Query) -> Result<Vec<T>, DispatchError>
    where
        T: TableBacked + DeserializeOwned,
    {
        Ok(repository::list_records::<T, _>(self.store(), tenant_id, query).await?)
    }

    pub async fn save<T>(
        &self,
        tenant_id: TenantId,
        record: T,
        expected: ExpectedVersion,
    ) -> Result<Versioned<T>, DispatchError>
    where
        T: TableBacked + Serialize + DeserializeOwned + Send,
    {
        let saved = repository::save(self.store(), tenant_id, record, expected).await?;
        tracing::info!(tenant_id = %tenant_id, table = T::TABLE, row_version = saved.row_version, "record saved");
        Ok(saved)
    }

    pub async fn remove<T>(&self, tenant_id: TenantId, id: RecordId) -> Result<(), DispatchError>
    where
        T: TableBacked,
    {
        repository::remove::<T, _>(self.store(), tenant_id, id).await?;
        tracing::info!(tenant_id = %tenant_id, table = T::TABLE, record_id = %id, "record deleted");
        Ok(())
    }

    pub async fn next_po_number(&self, tenant_id: TenantId, year: i32) -> Result<String, DispatchError> {
        allocate_po_number(self.store(), tenant_id, year).await
    }
}

/// Select the record store from configuration: Postgres when `database_url`
/// is set (schema applied on startup), in-memory otherwise; wrapped in the
/// query cache unless its TTL is zero. Mail goes through SMTP unless
/// `mail_transport = "log"`.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let base: SharedStore = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresRecordStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            tracing::info!("using postgres record store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("database_url not set; records are kept in memory");
            Arc::new(InMemoryRecordStore::new())
        }
    };

    let store: SharedStore = if config.cache_ttl().is_zero() {
        base
    } else {
        Arc::new(CachedRecordStore::new(base, config.cache_ttl()))
    };

    let mailer: Arc<dyn Mailer> = match config.mail_transport.as_str() {
        "log" => {
            tracing::warn!("mail_transport is `log`; emails are logged, not delivered");
            Arc::new(LogMailer)
        }
        _ => Arc::new(SmtpMailer::new(config.smtp_timeout())),
    };

    Ok(AppServices::new(
        store,
        Arc::new(InMemoryEventBus::new()),
        mailer,
        config.smtp_timeout(),
    ))
}
