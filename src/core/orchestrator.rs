//! Main orchestrator for a wrapper run.
//!
//! Runs the steps strictly in order:
//!
//! ```text
//! START -> ResolveSecrets -> Intake -> RunScript -> Notify -> END
//! ```
//!
//! Each step is time-bounded. The first failing step aborts the run; there
//! is no retry, partial completion or rollback.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;

use super::intake::{Intake, WorkItemIntake};
use super::notifier::CompletionNotifier;
use super::secrets::SecretResolver;
use crate::adapters::smtp::SmtpConnector;
use crate::adapters::{CommandScript, FileVault, FileWorkItems, ReqwestProbe};
use crate::config::{ResolvedConfig, TimeoutSettings};
use crate::domain::{CredentialEnv, ScriptResult};
use crate::error::{bounded, Stage, WrapperError};
use crate::script::{BusinessScript, MockScript};

/// Summary of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub item_id: String,
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub status_code: i32,
    pub recipient: Option<String>,
}

/// Sequences the four steps of a run
pub struct Orchestrator {
    secrets: Arc<SecretResolver>,
    bundles: Vec<String>,
    intake: WorkItemIntake,
    script: Box<dyn BusinessScript>,
    notifier: CompletionNotifier,
    timeouts: TimeoutSettings,
}

impl Orchestrator {
    pub fn new(
        secrets: Arc<SecretResolver>,
        bundles: Vec<String>,
        intake: WorkItemIntake,
        script: Box<dyn BusinessScript>,
        notifier: CompletionNotifier,
        timeouts: TimeoutSettings,
    ) -> Self {
        Self {
            secrets,
            bundles,
            intake,
            script,
            notifier,
            timeouts,
        }
    }

    /// Wire the production adapters described by `config`
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, WrapperError> {
        let secrets = Arc::new(SecretResolver::new(Arc::new(FileVault::new(
            &config.secrets_file,
        ))));

        let queue = FileWorkItems::new(&config.work_items_file, config.releases_file());
        let intake = WorkItemIntake::new(Arc::new(queue));

        let script: Box<dyn BusinessScript> = match config.script.command {
            Some(ref command) => Box::new(CommandScript::new(
                command.clone(),
                &config.root,
                config.timeouts.script(),
            )),
            None => {
                let probe = ReqwestProbe::new(config.timeouts.http())
                    .map_err(|e| WrapperError::Config(format!("{:#}", e)))?;
                Box::new(
                    MockScript::new(
                        &config.output_dir,
                        &config.script,
                        config.bundles.clone(),
                        Arc::new(probe),
                    )
                    .with_http_timeout(config.timeouts.http()),
                )
            }
        };

        let connector =
            SmtpConnector::from_settings(&config.email).with_timeout(config.timeouts.notify());
        let notifier = CompletionNotifier::new(
            secrets.clone(),
            Arc::new(connector),
            config.email.secret.clone(),
            config.email.subject.clone(),
        );

        Ok(Self::new(
            secrets,
            config.bundles.clone(),
            intake,
            script,
            notifier,
            config.timeouts.clone(),
        ))
    }

    /// Execute one run
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self) -> Result<RunReport, WrapperError> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        info!(%run_id, "START");

        let result = self.execute(run_id).await;
        match &result {
            Ok(report) => info!(
                %run_id,
                item_id = %report.item_id,
                status_code = report.status_code,
                "END"
            ),
            Err(e) => error!(
                %run_id,
                stage = %e.stage(),
                kind = e.kind(),
                exit_code = e.exit_code(),
                error = %e,
                "Run failed"
            ),
        }
        result
    }

    async fn execute(&self, run_id: Uuid) -> Result<RunReport, WrapperError> {
        let env = self.resolve_secrets().await?;
        let intake = self.take_work_item().await?;

        // From here on the item is ours and gets acknowledged either way.
        match self.process(run_id, &intake, &env).await {
            Ok(report) => {
                self.intake.complete(&intake.item_id).await;
                Ok(report)
            }
            Err(e) => {
                self.intake.fail(&intake.item_id, &e).await;
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        run_id: Uuid,
        intake: &Intake,
        env: &CredentialEnv,
    ) -> Result<RunReport, WrapperError> {
        let result = self.run_script(intake, env).await?;
        self.send_completion(intake, &result).await?;

        Ok(RunReport {
            run_id,
            item_id: intake.item_id.clone(),
            input_file: intake.file_path.clone(),
            output_file: result.output_file,
            status_code: result.status_code,
            recipient: intake.requesting_user.clone(),
        })
    }

    async fn resolve_secrets(&self) -> Result<CredentialEnv, WrapperError> {
        info!(stage = %Stage::Credentials, bundles = ?self.bundles, "Resolving credentials");
        let mut env = CredentialEnv::new();
        bounded(
            Stage::Credentials,
            self.timeouts.secrets(),
            self.secrets.resolve_all(&self.bundles, &mut env),
        )
        .await?;
        info!(stage = %Stage::Credentials, entries = env.len(), "Credentials resolved");
        Ok(env)
    }

    async fn take_work_item(&self) -> Result<Intake, WrapperError> {
        let intake = bounded(
            Stage::Intake,
            self.timeouts.intake(),
            self.intake.fetch_next(),
        )
        .await?;
        info!(
            stage = %Stage::Intake,
            item_id = %intake.item_id,
            file = %intake.file_path.display(),
            "Work item taken"
        );
        Ok(intake)
    }

    async fn run_script(
        &self,
        intake: &Intake,
        env: &CredentialEnv,
    ) -> Result<ScriptResult, WrapperError> {
        info!(stage = %Stage::Script, script = self.script.name(), "Running business script");
        let result = bounded(
            Stage::Script,
            self.timeouts.script(),
            self.script.run(&intake.file_path, env),
        )
        .await?;
        info!(
            stage = %Stage::Script,
            output = %result.output_file.display(),
            status_code = result.status_code,
            "Business script finished"
        );
        Ok(result)
    }

    async fn send_completion(
        &self,
        intake: &Intake,
        result: &ScriptResult,
    ) -> Result<(), WrapperError> {
        info!(stage = %Stage::Notify, "Sending completion email");
        bounded(
            Stage::Notify,
            self.timeouts.notify(),
            self.notifier.notify(
                intake.requesting_user.as_deref(),
                result.status_code,
                &result.output_file,
            ),
        )
        .await
    }
}
