//! taskwrap - unattended wrapper around a pre-existing business script
//!
//! Runs one piece of queued work end to end: fetches the credentials the
//! script needs from a secret store, takes a work item off the queue, runs
//! the script on the item's first attached file, and mails the script's
//! report back to whoever queued the item.
//!
//! # Modules
//!
//! - `adapters`: External systems (secret store, work-item queue, SMTP, HTTP,
//!   external script process)
//! - `core`: Secret resolution, intake, notification and the orchestrator
//! - `domain`: Data structures (credentials, work items, script results)
//! - `script`: Business script boundary and the built-in reference script
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process the next work item
//! taskwrap run
//!
//! # Only transform a workbook
//! taskwrap transform --input input.xlsx
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod logging;
pub mod script;

// Re-export main types at crate root for convenience
pub use core::{Orchestrator, RunReport};
pub use domain::{CredentialBundle, CredentialEnv, ScriptResult, WorkItem};
pub use error::{Stage, WrapperError};
