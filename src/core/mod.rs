//! Core orchestration logic.
//!
//! This module contains:
//! - SecretResolver: credential bundles into the propagation table
//! - WorkItemIntake: first file and requesting user of the next work item
//! - CompletionNotifier: the result email
//! - Orchestrator: sequences the steps of a run

pub mod intake;
pub mod notifier;
pub mod orchestrator;
pub mod secrets;

// Re-export commonly used types
pub use intake::{Intake, WorkItemIntake};
pub use notifier::CompletionNotifier;
pub use orchestrator::{Orchestrator, RunReport};
pub use secrets::SecretResolver;
