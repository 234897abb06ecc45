//! Completion email.
//!
//! Sends the business script's report back to whoever queued the work.
//! Order of checks:
//! 1. a missing recipient fails before any secret or network access
//! 2. the email secret is resolved (`{user, password}`)
//! 3. the transport authenticates (`AuthenticationFailed` on error)
//! 4. one message goes out (`SendFailed` on error); no retry

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::secrets::SecretResolver;
use crate::adapters::{MailTransportFactory, OutgoingMail};
use crate::error::WrapperError;

/// Body of the completion message
pub fn completion_body(status_code: i32) -> String {
    format!(
        "Python script executed with exit code {}. Please find the output report attached.",
        status_code
    )
}

/// Split a recipient string into addresses (comma separated)
pub fn parse_recipients(recipient: Option<&str>) -> Result<Vec<String>, WrapperError> {
    let recipients: Vec<String> = recipient
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();

    if recipients.is_empty() {
        return Err(WrapperError::MissingRecipient);
    }
    Ok(recipients)
}

/// Resolves the transport secret and sends the completion message
pub struct CompletionNotifier {
    secrets: Arc<SecretResolver>,
    transports: Arc<dyn MailTransportFactory>,
    secret_name: String,
    subject: String,
}

impl CompletionNotifier {
    pub fn new(
        secrets: Arc<SecretResolver>,
        transports: Arc<dyn MailTransportFactory>,
        secret_name: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            transports,
            secret_name: secret_name.into(),
            subject: subject.into(),
        }
    }

    pub async fn notify(
        &self,
        recipient: Option<&str>,
        status_code: i32,
        attachment: &Path,
    ) -> Result<(), WrapperError> {
        let recipients = parse_recipients(recipient)?;

        let credential = self.secrets.resolve_email(&self.secret_name).await?;

        let transport = self
            .transports
            .connect(&credential.user, &credential.password)
            .map_err(|e| WrapperError::AuthenticationFailed {
                account: credential.user.clone(),
                reason: format!("{:#}", e),
            })?;

        info!(account = %credential.user, "Authenticating to email");
        transport
            .authorize()
            .await
            .map_err(|e| WrapperError::AuthenticationFailed {
                account: credential.user.clone(),
                reason: format!("{:#}", e),
            })?;

        let mail = OutgoingMail {
            sender: credential.user.clone(),
            recipients,
            subject: self.subject.clone(),
            body: completion_body(status_code),
            attachments: vec![attachment.to_path_buf()],
        };

        info!(recipients = ?mail.recipients, "Sending email message");
        transport
            .send_message(&mail)
            .await
            .map_err(|e| WrapperError::SendFailed(format!("{:#}", e)))?;

        info!("Email sent successfully");
        Ok(())
    }
}
