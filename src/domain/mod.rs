//! Domain types for a wrapper run.
//!
//! This module contains the data handed between steps:
//! - Credentials: secret bundles and the environment propagation table
//! - WorkItem: the queued unit of work
//! - ScriptResult: what the business script hands back

pub mod credentials;
pub mod work_item;

use std::path::PathBuf;

// Re-export commonly used types
pub use credentials::{CredentialBundle, CredentialEnv, EmailCredential, Secret};
pub use work_item::WorkItem;

/// Output of one business script invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptResult {
    /// Report file produced by the script
    pub output_file: PathBuf,

    /// Script exit status; non-zero marks a business-level problem
    pub status_code: i32,
}
