//! Error kinds for a wrapper run.
//!
//! Every error is fatal to the run. Each variant belongs to the stage of the
//! run that produced it, and the stage decides the process exit code so an
//! operator can tell which external system to look at.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Step of the orchestration a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Credentials,
    Intake,
    Script,
    Notify,
}

impl Stage {
    /// Process exit status reported when a run fails in this stage
    pub fn exit_code(self) -> u8 {
        match self {
            Stage::Config => 2,
            Stage::Credentials => 10,
            Stage::Intake => 20,
            Stage::Script => 30,
            Stage::Notify => 40,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Credentials => "credentials",
            Stage::Intake => "intake",
            Stage::Script => "script",
            Stage::Notify => "notify",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum WrapperError {
    #[error("Secret not found: {name}")]
    SecretNotFound { name: String },

    #[error("Secret store failed for '{name}': {reason}")]
    SecretStoreFailed { name: String, reason: String },

    #[error("Secret '{name}' is missing field '{field}'")]
    InvalidSecret { name: String, field: String },

    #[error("Invalid credential bundle name: '{0}'")]
    InvalidBundleName(String),

    #[error("Credential bundles '{first}' and '{second}' map to the same environment keys")]
    BundleCollision { first: String, second: String },

    #[error("No work item available")]
    NoWorkItem,

    #[error("Work item {item_id} has no attached files")]
    NoAttachment { item_id: String },

    #[error("Work item {item_id} attachment not found: {path}")]
    AttachmentMissing { item_id: String, path: String },

    #[error("Work item intake failed: {0}")]
    IntakeFailed(String),

    #[error("Script execution failed: {0}")]
    ScriptExecutionFailed(String),

    #[error("Email authentication failed for '{account}': {reason}")]
    AuthenticationFailed { account: String, reason: String },

    #[error("Email send failed: {0}")]
    SendFailed(String),

    #[error("No recipient for completion email")]
    MissingRecipient,

    #[error("{stage} step timed out after {seconds}s")]
    Timeout { stage: Stage, seconds: u64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WrapperError {
    /// Stage of the run this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            Self::SecretNotFound { .. }
            | Self::SecretStoreFailed { .. }
            | Self::InvalidSecret { .. }
            | Self::InvalidBundleName(_)
            | Self::BundleCollision { .. } => Stage::Credentials,

            Self::NoWorkItem
            | Self::NoAttachment { .. }
            | Self::AttachmentMissing { .. }
            | Self::IntakeFailed(_) => Stage::Intake,

            Self::ScriptExecutionFailed(_) => Stage::Script,

            Self::AuthenticationFailed { .. } | Self::SendFailed(_) | Self::MissingRecipient => {
                Stage::Notify
            }

            Self::Timeout { stage, .. } => *stage,
            Self::Config(_) => Stage::Config,
        }
    }

    /// Short machine-friendly name of the error kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SecretNotFound { .. } => "SecretNotFound",
            Self::SecretStoreFailed { .. } => "SecretStoreFailed",
            Self::InvalidSecret { .. } => "InvalidSecret",
            Self::InvalidBundleName(_) => "InvalidBundleName",
            Self::BundleCollision { .. } => "BundleCollision",
            Self::NoWorkItem => "NoWorkItem",
            Self::NoAttachment { .. } => "NoAttachment",
            Self::AttachmentMissing { .. } => "AttachmentMissing",
            Self::IntakeFailed(_) => "IntakeFailed",
            Self::ScriptExecutionFailed(_) => "ScriptExecutionFailed",
            Self::AuthenticationFailed { .. } => "AuthenticationFailed",
            Self::SendFailed(_) => "SendFailed",
            Self::MissingRecipient => "MissingRecipient",
            Self::Timeout { .. } => "Timeout",
            Self::Config(_) => "Config",
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        self.stage().exit_code()
    }
}

/// Run `fut` with an upper bound on its duration.
///
/// Overrunning the limit drops the future and reports a `Timeout` attributed
/// to `stage`.
pub async fn bounded<T, F>(stage: Stage, limit: Duration, fut: F) -> Result<T, WrapperError>
where
    F: Future<Output = Result<T, WrapperError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(WrapperError::Timeout {
            stage,
            seconds: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_separate_external_systems() {
        let credential = WrapperError::SecretNotFound {
            name: "domain_one".to_string(),
        };
        let intake = WrapperError::NoAttachment {
            item_id: "item-0".to_string(),
        };
        let notify = WrapperError::MissingRecipient;

        assert_eq!(credential.exit_code(), 10);
        assert_eq!(intake.exit_code(), 20);
        assert_eq!(notify.exit_code(), 40);
        assert_eq!(
            WrapperError::ScriptExecutionFailed("boom".to_string()).exit_code(),
            30
        );
    }

    #[test]
    fn test_timeout_takes_stage_exit_code() {
        let err = WrapperError::Timeout {
            stage: Stage::Notify,
            seconds: 60,
        };
        assert_eq!(err.stage(), Stage::Notify);
        assert_eq!(err.exit_code(), 40);
        assert_eq!(err.to_string(), "notify step timed out after 60s");
        assert_eq!(err.kind(), "Timeout");
    }

    #[tokio::test]
    async fn test_bounded_passes_through_result() {
        let result = bounded(Stage::Intake, Duration::from_secs(1), async {
            Ok::<_, WrapperError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_bounded_reports_timeout() {
        let result: Result<(), _> = bounded(Stage::Script, Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(WrapperError::Timeout {
                stage: Stage::Script,
                ..
            })
        ));
    }
}
