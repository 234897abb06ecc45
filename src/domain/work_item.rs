//! Work items handed off through the work-item queue.

use serde::{Deserialize, Serialize};

/// One unit of work dequeued from the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Queue-assigned identifier
    pub id: String,

    /// Attached file references, in attachment order
    #[serde(default)]
    pub files: Vec<String>,

    /// Unstructured payload set by whoever queued the item
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, files: Vec<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            files,
            payload,
        }
    }

    /// First attached file reference, if any
    pub fn first_file(&self) -> Option<&str> {
        self.files.first().map(String::as_str)
    }

    /// Address of the user who mailed the item in (`email.from.address`).
    ///
    /// Any missing or mistyped level yields `None`.
    pub fn requesting_user(&self) -> Option<String> {
        let payload: EmailPayload = serde_json::from_value(self.payload.clone()).ok()?;
        payload
            .email?
            .from?
            .address
            .filter(|address| !address.trim().is_empty())
    }
}

/// The part of a payload written by the email trigger
#[derive(Debug, Default, Deserialize)]
struct EmailPayload {
    #[serde(default)]
    email: Option<EmailEnvelope>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailEnvelope {
    #[serde(default)]
    from: Option<EmailAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailAddress {
    #[serde(default)]
    address: Option<String>,
}
