//! Business script boundary.
//!
//! The wrapper does not own the business logic. It only needs a script that
//! takes one input file path and the run's credential table, and hands back
//! an output file path plus an integer status code. Business-level problems
//! become a non-zero status code; only environment failures are errors.

pub mod mock;
pub mod spreadsheet;

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{CredentialEnv, ScriptResult};
use crate::error::WrapperError;

pub use mock::MockScript;
pub use spreadsheet::{Cell, IncrementReport, Sheet};

/// Contract the wrapped script must honor
#[async_trait]
pub trait BusinessScript: Send + Sync {
    /// Human-readable script name
    fn name(&self) -> &str;

    async fn run(&self, input: &Path, env: &CredentialEnv) -> Result<ScriptResult, WrapperError>;
}
