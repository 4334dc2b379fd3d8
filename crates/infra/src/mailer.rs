//! Outgoing mail: delivery seam, SMTP delivery and mail-server connection test.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpStream;

use procura_notifications::{EmailProviderSettings, RenderedEmail};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body_html: String,
    pub body_text: Option<String>,
}

impl OutgoingEmail {
    pub fn from_rendered(settings: &EmailProviderSettings, to: Vec<String>, rendered: RenderedEmail) -> Self {
        Self {
            from: settings.from_header(),
            to,
            subject: rendered.subject,
            body_html: rendered.body_html,
            body_text: rendered.body_text,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("email provider is not active")]
    ProviderInactive,
    #[error("no recipients")]
    NoRecipients,
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Delivery seam. [`SmtpMailer`] relays through the tenant's provider;
/// [`LogMailer`] and [`OutboxMailer`] serve development and tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, settings: &EmailProviderSettings, email: OutgoingEmail) -> Result<(), MailError>;
}

fn check_sendable(settings: &EmailProviderSettings, email: &OutgoingEmail) -> Result<(), MailError> {
    if !settings.is_active {
        return Err(MailError::ProviderInactive);
    }
    if email.to.iter().all(|to| to.trim().is_empty()) {
        return Err(MailError::NoRecipients);
    }
    Ok(())
}

/// Writes each message to the log instead of delivering it.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, settings: &EmailProviderSettings, email: OutgoingEmail) -> Result<(), MailError> {
        check_sendable(settings, &email)?;
        tracing::info!(
            relay = %format!("{}:{}", settings.host, settings.port),
            from = %email.from,
            to = ?email.to,
            subject = %email.subject,
            "email queued"
        );
        Ok(())
    }
}

/// Keeps sent messages in memory (tests, local development).
#[derive(Debug, Default)]
pub struct OutboxMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, settings: &EmailProviderSettings, email: OutgoingEmail) -> Result<(), MailError> {
        check_sendable(settings, &email)?;
        self.sent
            .lock()
            .map_err(|_| MailError::Delivery("outbox lock poisoned".to_string()))?
            .push(email);
        Ok(())
    }
}

/// Implicit-TLS submission port; other TLS ports upgrade with STARTTLS.
const SMTPS_PORT: u16 = 465;

pub type SmtpTransport = AsyncSmtpTransport<Tokio1Executor>;

/// Transport for one provider: STARTTLS (or implicit TLS on 465) when
/// `use_tls` is set, plain SMTP otherwise; credentials when a username is set.
pub fn smtp_transport(settings: &EmailProviderSettings, timeout: Duration) -> Result<SmtpTransport, MailError> {
    let host = settings.host.trim();
    let builder = if !settings.use_tls {
        SmtpTransport::builder_dangerous(host)
    } else if settings.port == SMTPS_PORT {
        SmtpTransport::relay(host).map_err(|e| MailError::Delivery(format!("invalid relay {host}: {e}")))?
    } else {
        SmtpTransport::starttls_relay(host).map_err(|e| MailError::Delivery(format!("invalid relay {host}: {e}")))?
    };

    let mut builder = builder.port(settings.port).timeout(Some(timeout));
    if let Some(username) = settings.username.as_deref().filter(|u| !u.trim().is_empty()) {
        builder = builder.credentials(Credentials::new(
            username.to_string(),
            settings.password.clone().unwrap_or_default(),
        ));
    }
    Ok(builder.build())
}

fn mailbox(raw: &str) -> Result<Mailbox, MailError> {
    raw.trim()
        .parse()
        .map_err(|e| MailError::Delivery(format!("invalid address '{raw}': {e}")))
}

/// MIME message with an HTML part and, when present, a plain-text alternative.
pub fn build_message(email: &OutgoingEmail) -> Result<Message, MailError> {
    let mut builder = Message::builder().from(mailbox(&email.from)?).subject(email.subject.clone());
    for to in email.to.iter().filter(|to| !to.trim().is_empty()) {
        builder = builder.to(mailbox(to)?);
    }

    let message = match &email.body_text {
        Some(text) => builder.multipart(MultiPart::alternative_plain_html(text.clone(), email.body_html.clone())),
        None => builder.header(ContentType::TEXT_HTML).body(email.body_html.clone()),
    };
    message.map_err(|e| MailError::Delivery(format!("failed to build message: {e}")))
}

/// Delivers through the provider's SMTP relay, one connection per message.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, settings: &EmailProviderSettings, email: OutgoingEmail) -> Result<(), MailError> {
        check_sendable(settings, &email)?;
        let message = build_message(&email)?;
        let transport = smtp_transport(settings, self.timeout)?;

        let response = transport
            .send(message)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;
        tracing::info!(
            relay = %format!("{}:{}", settings.host, settings.port),
            to = ?email.to,
            subject = %email.subject,
            code = %response.code(),
            "email delivered"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionTestResult {
    pub ok: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Open (and drop) a TCP connection to the relay within `timeout`.
pub async fn test_connection(host: &str, port: u16, timeout: Duration) -> ConnectionTestResult {
    let started = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => ConnectionTestResult {
            ok: true,
            latency_ms: Some(started.elapsed().as_millis() as u64),
            error: None,
        },
        Ok(Err(err)) => ConnectionTestResult {
            ok: false,
            latency_ms: None,
            error: Some(err.to_string()),
        },
        Err(_) => ConnectionTestResult {
            ok: false,
            latency_ms: None,
            error: Some(format!("connection timed out after {}s", timeout.as_secs_f64())),
        },
    }
}
