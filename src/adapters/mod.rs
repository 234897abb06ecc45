//! Adapter interfaces for external systems.
//!
//! Adapters give the run a narrow interface to each collaborator it does not
//! own: the secret store, the work-item queue, the mail transport and the
//! HTTP endpoints the business script talks to. Adapters report failures as
//! `anyhow` errors; the core components decide which error kind a failure
//! is.

pub mod command;
pub mod http;
pub mod smtp;
pub mod vault;
pub mod work_items;

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{Secret, WorkItem};

// Re-export the concrete adapters
pub use command::CommandScript;
pub use http::ReqwestProbe;
pub use smtp::SmtpMailer;
pub use vault::{FileVault, StaticVault};
pub use work_items::FileWorkItems;

/// Named secret lookup
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Human-readable store name
    fn name(&self) -> &str;

    /// Fetch a secret; `Ok(None)` when the store has no such entry
    async fn get_secret(&self, name: &str) -> Result<Option<Secret>>;
}

/// How a work item left the wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    Done,
    Failed { code: String, message: String },
}

/// Source of work items
#[async_trait]
pub trait WorkItemQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Next unreleased item, `Ok(None)` when the queue is empty
    async fn next_item(&self) -> Result<Option<WorkItem>>;

    /// Local path of one of the item's attached files
    async fn get_file(&self, item: &WorkItem, file_ref: &str) -> Result<PathBuf>;

    /// Acknowledge an item so it is not handed out again
    async fn release(&self, item_id: &str, release: Release) -> Result<()>;
}

/// One outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

/// Mail transport that authenticates before sending
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Open an authenticated session (or prove one can be opened)
    async fn authorize(&self) -> Result<()>;

    async fn send_message(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Builds a transport once the account credentials are known
pub trait MailTransportFactory: Send + Sync {
    fn connect(&self, account: &str, password: &str) -> Result<Box<dyn MailTransport>>;
}

/// HTTP GET used to reach the business domains
#[async_trait]
pub trait HttpProbe: Send + Sync {
    /// Issue a GET and return the response status code
    async fn get(&self, url: &str) -> Result<u16>;
}

/// Attachment file name as shown to the recipient
pub fn attachment_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
