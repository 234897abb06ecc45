//! Command-line interface for taskwrap.
//!
//! Provides commands for running the wrapper, running only the built-in
//! spreadsheet transform, and showing the resolved configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::ReqwestProbe;
use crate::config::{self, ResolvedConfig};
use crate::core::{Orchestrator, RunReport};
use crate::error::WrapperError;
use crate::script::MockScript;

/// taskwrap - run a business script against a queued work item and mail
/// back the result
#[derive(Parser, Debug)]
#[command(name = "taskwrap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: TASKWRAP_CONFIG or .taskwrap/config.yaml)
    #[arg(short, long, global = true, env = "TASKWRAP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve credentials, take one work item, run the script, mail the result
    Run,

    /// Run only the built-in spreadsheet transform on a file
    Transform {
        /// Input workbook
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Load configuration for this invocation
    pub fn load_config(&self) -> Result<ResolvedConfig> {
        let mut config = config::load_config(self.config.as_deref())?;
        if let Some(Commands::Transform {
            output_dir: Some(ref dir),
            ..
        }) = self.command
        {
            config.output_dir = dir.clone();
        }
        Ok(config)
    }

    /// Execute the CLI command
    pub async fn execute(self, config: ResolvedConfig) -> Result<(), WrapperError> {
        match self.command.unwrap_or(Commands::Run) {
            Commands::Run => run(&config).await.map(|report| print_report(&report)),
            Commands::Transform { input, .. } => transform(&config, input).await,
            Commands::Config => show_config(&config).map_err(|e| WrapperError::Config(format!("{:#}", e))),
        }
    }
}

async fn run(config: &ResolvedConfig) -> Result<RunReport, WrapperError> {
    let orchestrator = Orchestrator::from_config(config)?;
    orchestrator.run().await
}

fn print_report(report: &RunReport) {
    println!("Run {} complete", report.run_id);
    println!("  Work item: {}", report.item_id);
    println!("  Input:     {}", report.input_file.display());
    println!("  Output:    {}", report.output_file.display());
    println!("  Status:    {}", report.status_code);
    println!(
        "  Mailed to: {}",
        report.recipient.as_deref().unwrap_or("-")
    );
}

async fn transform(config: &ResolvedConfig, input: PathBuf) -> Result<(), WrapperError> {
    let probe = ReqwestProbe::new(config.timeouts.http())
        .map_err(|e| WrapperError::Config(format!("{:#}", e)))?;
    let script = MockScript::new(&config.output_dir, &config.script, Vec::new(), Arc::new(probe));

    let (output, status) = script.transform(&input).await?;
    println!("{}", output.display());
    if status != 0 {
        eprintln!("Transform finished with status {}", status);
    }
    Ok(())
}

fn show_config(config: &ResolvedConfig) -> Result<()> {
    let rendered = serde_yaml::to_string(config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::parse_from(["taskwrap"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_transform_args() {
        let cli = Cli::parse_from([
            "taskwrap",
            "--config",
            "/srv/job/wrapper.yaml",
            "transform",
            "--input",
            "in.xlsx",
            "--output-dir",
            "/tmp/out",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/srv/job/wrapper.yaml")));
        match cli.command {
            Some(Commands::Transform { input, output_dir }) => {
                assert_eq!(input, PathBuf::from("in.xlsx"));
                assert_eq!(output_dir, Some(PathBuf::from("/tmp/out")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("TASKWRAP_CONFIG", "/srv/job/from-env.yaml");
        let from_env = Cli::parse_from(["taskwrap", "config"]);
        let from_flag = Cli::parse_from(["taskwrap", "--config", "/srv/job/flag.yaml"]);
        std::env::remove_var("TASKWRAP_CONFIG");

        assert_eq!(from_env.config, Some(PathBuf::from("/srv/job/from-env.yaml")));
        assert_eq!(from_flag.config, Some(PathBuf::from("/srv/job/flag.yaml")));
    }
}
