//! Built-in reference business script.
//!
//! Reads the input workbook, echoes every row to the log, adds a fixed
//! amount to one numeric column, writes the rows to `output.xlsx` in the
//! output directory, then checks each business domain with an HTTP GET
//! using that domain's credentials.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use super::spreadsheet::{self, Cell, IncrementReport, Sheet};
use super::BusinessScript;
use crate::adapters::http::is_timeout;
use crate::adapters::HttpProbe;
use crate::config::ScriptSettings;
use crate::domain::{CredentialEnv, ScriptResult};
use crate::error::{Stage, WrapperError};

pub const OUTPUT_FILE_NAME: &str = "output.xlsx";

/// Credentials used when a domain has no entry in the table
const DOMAIN_DEFAULTS: &[(&str, &str, &str, &str)] = &[
    ("domain_one", "user1", "pass1", "https://www.example.com"),
    (
        "domain_two",
        "user2",
        "pass2",
        "https://file-examples.com/storage/fe783a5cbb6323602a28c66/2017/10/file_example_PNG_500kB.png",
    ),
];

/// Connection details for one business domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainTarget {
    pub domain: String,
    pub user: String,
    pub url: String,
}

/// Spreadsheet transform plus domain checks
pub struct MockScript {
    output_dir: PathBuf,
    column: String,
    increment: f64,
    domains: Vec<String>,
    probe: Arc<dyn HttpProbe>,
    http_timeout: Duration,
}

impl MockScript {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        settings: &ScriptSettings,
        domains: Vec<String>,
        probe: Arc<dyn HttpProbe>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            column: settings.column.clone(),
            increment: settings.increment,
            domains,
            probe,
            http_timeout: Duration::from_secs(30),
        }
    }

    /// Timeout the HTTP probe was built with, reported on overrun
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn output_file(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_FILE_NAME)
    }

    /// Spreadsheet half of the script: returns the output path and status
    #[instrument(skip(self, input), fields(input = %input.display()))]
    pub async fn transform(&self, input: &Path) -> Result<(PathBuf, i32), WrapperError> {
        info!("Reading Excel file");
        if !input.exists() {
            return Err(WrapperError::ScriptExecutionFailed(format!(
                "input file not found: {}",
                input.display()
            )));
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                WrapperError::ScriptExecutionFailed(format!(
                    "cannot create output directory {}: {}",
                    self.output_dir.display(),
                    e
                ))
            })?;

        let input = input.to_path_buf();
        let output = self.output_file();
        let column = self.column.clone();
        let increment = self.increment;

        let job_output = output.clone();
        let report = tokio::task::spawn_blocking(move || -> anyhow::Result<IncrementReport> {
            let mut sheet = spreadsheet::read_sheet(&input)?;
            log_rows(&sheet);
            let report = spreadsheet::increment_column(&mut sheet, &column, increment);
            spreadsheet::write_sheet(&job_output, &sheet)?;
            Ok(report)
        })
        .await
        .map_err(|e| WrapperError::ScriptExecutionFailed(format!("spreadsheet task panicked: {}", e)))?
        .map_err(|e| WrapperError::ScriptExecutionFailed(format!("{:#}", e)))?;

        let status = if report.is_clean() {
            0
        } else {
            if report.missing_column {
                warn!(column = %self.column, "Column not found, rows copied unchanged");
            }
            if !report.skipped.is_empty() {
                warn!(
                    column = %self.column,
                    rows = ?report.skipped,
                    "Non-numeric cells left unchanged"
                );
            }
            1
        };

        info!(output = %output.display(), updated = report.updated, status, "Workbook saved");
        Ok((output, status))
    }

    /// Reach one business domain
    async fn execute_against_domain(&self, target: &DomainTarget) -> Result<(), WrapperError> {
        info!(domain = %target.domain, "Executing against domain");
        info!(
            user = %target.user,
            password = "****",
            url = %target.url,
            "Using domain credentials"
        );

        let status = self.probe.get(&target.url).await.map_err(|e| {
            if is_timeout(&e) {
                WrapperError::Timeout {
                    stage: Stage::Script,
                    seconds: self.http_timeout.as_secs(),
                }
            } else {
                WrapperError::ScriptExecutionFailed(format!(
                    "domain '{}' unreachable: {:#}",
                    target.domain, e
                ))
            }
        })?;

        info!(domain = %target.domain, status, "Received response");
        Ok(())
    }
}

#[async_trait]
impl BusinessScript for MockScript {
    fn name(&self) -> &str {
        "builtin"
    }

    async fn run(&self, input: &Path, env: &CredentialEnv) -> Result<ScriptResult, WrapperError> {
        info!(input = %input.display(), "Executing business script");
        let (output_file, status_code) = self.transform(input).await?;

        for domain in &self.domains {
            match domain_target(domain, env) {
                Some(target) => self.execute_against_domain(&target).await?,
                None => warn!(domain = %domain, "No credentials for domain, skipping"),
            }
        }

        info!("Execution of business script complete");
        Ok(ScriptResult {
            output_file,
            status_code,
        })
    }
}

/// Credentials for `domain` from the table, falling back to the built-in
/// defaults field by field
pub fn domain_target(domain: &str, env: &CredentialEnv) -> Option<DomainTarget> {
    let defaults = DOMAIN_DEFAULTS
        .iter()
        .find(|(name, ..)| *name == domain)
        .map(|(_, user, _, url)| (*user, *url));

    let user = env
        .field(domain, "user")
        .or(defaults.map(|(user, _)| user))?;
    let url = env.field(domain, "url").or(defaults.map(|(_, url)| url))?;

    Some(DomainTarget {
        domain: domain.to_string(),
        user: user.to_string(),
        url: url.to_string(),
    })
}

fn log_rows(sheet: &Sheet) {
    for row in &sheet.rows {
        let rendered: Vec<String> = sheet
            .headers
            .iter()
            .zip(row)
            .map(|(header, cell)| format!("{}: {}", header, render(cell)))
            .collect();
        info!("Row contents are: {{{}}}", rendered.join(", "));
    }
}

fn render(cell: &Cell) -> String {
    match cell {
        Cell::Empty => "None".to_string(),
        Cell::Text(text) => format!("'{}'", text),
        Cell::Number(n) => n.to_string(),
        Cell::Bool(b) => b.to_string(),
        Cell::DateTime(serial) => match cell.as_datetime() {
            Some(dt) if serial.fract() == 0.0 => dt.date().to_string(),
            Some(dt) => dt.to_string(),
            None => serial.to_string(),
        },
    }
}
