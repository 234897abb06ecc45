//! SMTP mail transport.
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport. The connection
//! settings (server, port, TLS mode) come from configuration; the account
//! and password come from the email secret, so the transport is built by
//! [`SmtpConnector`] only once that secret has been resolved.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{attachment_name, MailTransport, MailTransportFactory, OutgoingMail};
use crate::config::{EmailSettings, TlsMode};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Builds authenticated SMTP transports from configured connection settings
#[derive(Debug, Clone)]
pub struct SmtpConnector {
    server: String,
    port: u16,
    tls: TlsMode,
    timeout: Option<Duration>,
}

impl SmtpConnector {
    pub fn new(server: impl Into<String>, port: u16, tls: TlsMode) -> Self {
        Self {
            server: server.into(),
            port,
            tls,
            timeout: None,
        }
    }

    pub fn from_settings(settings: &EmailSettings) -> Self {
        Self::new(settings.smtp_server.clone(), settings.smtp_port, settings.tls)
    }

    /// Per-command socket timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl MailTransportFactory for SmtpConnector {
    fn connect(&self, account: &str, password: &str) -> Result<Box<dyn MailTransport>> {
        let builder = match self.tls {
            TlsMode::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.server)
                .with_context(|| format!("Invalid SMTP server: {}", self.server))?,
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.server)
                .with_context(|| format!("Invalid SMTP server: {}", self.server))?,
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.server),
        };

        let transport = builder
            .port(self.port)
            .timeout(self.timeout)
            .credentials(Credentials::new(account.to_string(), password.to_string()))
            .build();

        Ok(Box::new(SmtpMailer {
            transport,
            server: self.server.clone(),
        }))
    }
}

/// Authenticated SMTP session for one account
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    server: String,
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn authorize(&self) -> Result<()> {
        // Opening a connection runs EHLO, STARTTLS and AUTH.
        let ok = self
            .transport
            .test_connection()
            .await
            .with_context(|| format!("Failed to authenticate to {}", self.server))?;
        if !ok {
            anyhow::bail!("SMTP server {} rejected the session", self.server);
        }
        Ok(())
    }

    async fn send_message(&self, mail: &OutgoingMail) -> Result<()> {
        let message = build_message(mail).await?;
        self.transport
            .send(message)
            .await
            .with_context(|| format!("Failed to send message via {}", self.server))?;
        debug!(recipients = ?mail.recipients, "Message accepted by SMTP server");
        Ok(())
    }
}

/// Assemble the MIME message, reading attachments from disk
pub async fn build_message(mail: &OutgoingMail) -> Result<Message> {
    let from: Mailbox = mail
        .sender
        .parse()
        .with_context(|| format!("Invalid sender address: {}", mail.sender))?;

    let mut builder = Message::builder().from(from).subject(mail.subject.clone());
    for recipient in &mail.recipients {
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("Invalid recipient address: {}", recipient))?;
        builder = builder.to(to);
    }

    let mut body = MultiPart::mixed().singlepart(SinglePart::plain(mail.body.clone()));
    for path in &mail.attachments {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read attachment: {}", path.display()))?;
        body = body.singlepart(Attachment::new(attachment_name(path)).body(bytes, content_type(path)?));
    }

    builder
        .multipart(body)
        .context("Failed to build email message")
}

fn content_type(path: &Path) -> Result<ContentType> {
    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("xlsx") => XLSX_MIME,
        Some("csv") => "text/csv",
        Some("txt") | Some("log") => "text/plain",
        _ => "application/octet-stream",
    };
    ContentType::parse(mime).with_context(|| format!("Invalid content type: {}", mime))
}
