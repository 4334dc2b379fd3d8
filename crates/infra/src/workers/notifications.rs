//! Email notifications for approval and award events.
//!
//! For each notified event type the tenant's active template with the
//! matching key is rendered with the event payload and sent to the
//! organization's contact address. Anything missing (template, active
//! provider, contact address) skips the notification; failures are logged
//! by the worker and never retried.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info};

use procura_core::{RecordId, TenantId};
use procura_events::{EventBus, EventEnvelope};
use procura_notifications::{
    EmailProviderSettings, EmailTemplate, OrganizationSettings, template_key_for_event, variables_from_json,
};

use crate::mailer::{MailError, Mailer, OutgoingEmail};
use crate::repository;
use crate::store::{Query, RecordStore, StoreError};
use crate::workers::{EventWorker, WorkerHandle};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Mail(#[from] MailError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// The event type has no notification.
    NotNotified,
    NoActiveTemplate(&'static str),
    ProviderNotConfigured,
    NoRecipient,
    Sent {
        template_key: &'static str,
        to: String,
        missing_variables: Vec<String>,
    },
}

pub struct NotificationHandler<S: ?Sized, M: ?Sized> {
    store: Arc<S>,
    mailer: Arc<M>,
}

impl<S: ?Sized, M: ?Sized> Clone for NotificationHandler<S, M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            mailer: self.mailer.clone(),
        }
    }
}

impl<S, M> NotificationHandler<S, M>
where
    S: RecordStore + ?Sized,
    M: Mailer + ?Sized,
{
    pub fn new(store: Arc<S>, mailer: Arc<M>) -> Self {
        Self { store, mailer }
    }

    pub async fn notify(&self, envelope: &EventEnvelope<JsonValue>) -> Result<NotificationOutcome, NotificationError> {
        let Some(template_key) = template_key_for_event(envelope.event_type()) else {
            return Ok(NotificationOutcome::NotNotified);
        };
        let tenant_id = envelope.tenant_id();
        let store = &*self.store;

        let template = repository::list_records::<EmailTemplate, _>(
            store,
            tenant_id,
            &Query::new().eq("template_key", template_key).limit(1),
        )
        .await?
        .into_iter()
        .find(|t| t.is_active);
        let Some(template) = template else {
            return Ok(NotificationOutcome::NoActiveTemplate(template_key));
        };

        let Some(provider) = load_singleton::<EmailProviderSettings, _>(store, tenant_id).await?
        else {
            return Ok(NotificationOutcome::ProviderNotConfigured);
        };
        if !provider.is_active {
            return Ok(NotificationOutcome::ProviderNotConfigured);
        }

        let organization = load_singleton::<OrganizationSettings, _>(store, tenant_id).await?;
        let Some(to) = organization.as_ref().and_then(|o| o.contact_email.clone()) else {
            return Ok(NotificationOutcome::NoRecipient);
        };

        let mut vars = variables_from_json(envelope.payload());
        vars.insert("event_type".to_string(), envelope.event_type().to_string());
        if let Some(org) = &organization {
            vars.insert("organization_name".to_string(), org.name.clone());
        }

        let rendered = template.render(&vars);
        let missing_variables = rendered.missing_variables.clone();
        if !missing_variables.is_empty() {
            debug!(template_key, missing = ?missing_variables, "template rendered with missing variables");
        }

        let email = OutgoingEmail::from_rendered(&provider, vec![to.clone()], rendered);
        self.mailer.send(&provider, email).await?;

        info!(tenant_id = %tenant_id, template_key, event_type = envelope.event_type(), "notification sent");
        Ok(NotificationOutcome::Sent {
            template_key,
            to,
            missing_variables,
        })
    }
}

async fn load_singleton<T, S>(store: &S, tenant_id: TenantId) -> Result<Option<T>, StoreError>
where
    T: procura_core::TableBacked + serde::de::DeserializeOwned,
    S: RecordStore + ?Sized,
{
    Ok(repository::load::<T, S>(store, tenant_id, RecordId::singleton(tenant_id))
        .await?
        .map(|v| v.into_inner()))
}

/// Run `handler` for every envelope on `bus`, on a dedicated thread.
///
/// `runtime` drives the async store and mailer calls from that thread.
pub fn spawn_notification_worker<B, S, M>(
    bus: &B,
    handler: NotificationHandler<S, M>,
    runtime: Handle,
) -> std::io::Result<WorkerHandle>
where
    B: EventBus<EventEnvelope<JsonValue>> + ?Sized,
    S: RecordStore + ?Sized + 'static,
    M: Mailer + ?Sized + 'static,
{
    EventWorker::spawn("procura-notifications", bus, None, move |envelope: EventEnvelope<JsonValue>| {
        runtime.block_on(handler.notify(&envelope)).map(|outcome| {
            debug!(event_type = envelope.event_type(), outcome = ?outcome, "notification handled");
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use procura_core::ExpectedVersion;
    use procura_events::InMemoryEventBus;
    use procura_notifications::default_templates;
    use serde_json::json;
    use uuid::Uuid;

    use crate::mailer::OutboxMailer;
    use crate::store::InMemoryRecordStore;

    async fn configured_tenant(store: &InMemoryRecordStore) -> TenantId {
        let tenant_id = TenantId::new();
        for template in default_templates(tenant_id) {
            repository::save(store, tenant_id, template, ExpectedVersion::NoRecord).await.unwrap();
        }
        let provider = EmailProviderSettings {
            tenant_id,
            host: "smtp.example.com".to_string(),
            port: 587,
            use_tls: true,
            username: None,
            password: None,
            from_email: "noreply@example.com".to_string(),
            from_name: Some("Acme Procurement".to_string()),
            is_active: true,
        };
        repository::save(store, tenant_id, provider, ExpectedVersion::Any).await.unwrap();
        let mut org = OrganizationSettings::defaults(tenant_id);
        org.name = "Acme".to_string();
        org.contact_email = Some("buyers@acme.test".to_string());
        repository::save(store, tenant_id, org, ExpectedVersion::Any).await.unwrap();
        tenant_id
    }

    fn po_approved(tenant_id: TenantId) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            RecordId::new(),
            "purchase_orders",
            "purchasing.order.approved",
            3,
            Utc::now(),
            json!({"po_number": "PO-2026-0007", "vendor_name": "Globex", "total_amount": 1250.5}),
        )
    }

    #[tokio::test]
    async fn renders_and_sends_the_matching_template() {
        let store = Arc::new(InMemoryRecordStore::new());
        let outbox = Arc::new(OutboxMailer::new());
        let tenant_id = configured_tenant(&store).await;
        let handler = NotificationHandler::new(store, outbox.clone());

        let outcome = handler.notify(&po_approved(tenant_id)).await.unwrap();
        assert_eq!(
            outcome,
            NotificationOutcome::Sent {
                template_key: "po_approved",
                to: "buyers@acme.test".to_string(),
                missing_variables: vec![],
            }
        );

        let sent = outbox.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Purchase order PO-2026-0007 approved");
        assert_eq!(sent[0].from, "Acme Procurement <noreply@example.com>");
        assert!(sent[0].body_html.contains("Globex (1250.5)"));
    }

    #[tokio::test]
    async fn missing_configuration_skips_delivery() {
        let store = Arc::new(InMemoryRecordStore::new());
        let outbox = Arc::new(OutboxMailer::new());
        let handler = NotificationHandler::new(store, outbox.clone());

        let bare = TenantId::new();
        assert_eq!(
            handler.notify(&po_approved(bare)).await.unwrap(),
            NotificationOutcome::NoActiveTemplate("po_approved")
        );

        let created = EventEnvelope::new(
            Uuid::now_v7(),
            bare,
            RecordId::new(),
            "purchase_orders",
            "purchasing.order.created",
            1,
            Utc::now(),
            json!({}),
        );
        assert_eq!(handler.notify(&created).await.unwrap(), NotificationOutcome::NotNotified);
        assert!(outbox.sent().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn worker_thread_delivers_published_events() {
        let store = Arc::new(InMemoryRecordStore::new());
        let outbox = Arc::new(OutboxMailer::new());
        let tenant_id = configured_tenant(&store).await;
        let bus = InMemoryEventBus::<EventEnvelope<JsonValue>>::new();

        let worker = spawn_notification_worker(
            &bus,
            NotificationHandler::new(store, outbox.clone()),
            Handle::current(),
        )
        .unwrap();
        bus.publish(po_approved(tenant_id)).unwrap();

        for _ in 0..100 {
            if !outbox.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::task::spawn_blocking(move || worker.shutdown()).await.unwrap();

        assert_eq!(outbox.sent().len(), 1);
    }
}
