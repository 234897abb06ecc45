//! Configuration for taskwrap.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (TASKWRAP_OUTPUT_DIR, RPA_SECRET_FILE,
//!    RPA_INPUT_WORKITEM_PATH, TASKWRAP_SMTP_SERVER, TASKWRAP_SMTP_PORT)
//! 2. Config file (--config, TASKWRAP_CONFIG, or .taskwrap/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .taskwrap/config.yaml
//! - Paths in config file are relative to the project root (the parent of
//!   `.taskwrap/`), or to the file's own directory when given explicitly

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::credentials::check_bundle_names;

pub const DEFAULT_SUBJECT: &str = "Mock Python Script Output";
pub const DEFAULT_EMAIL_SECRET: &str = "email_app_password";
pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub script: Option<ScriptConfig>,
    #[serde(default)]
    pub timeouts: Option<TimeoutsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Output directory for reports, logs and queue state
    pub output: Option<String>,
    /// Local secrets file (JSON or YAML)
    pub secrets: Option<String>,
    /// Local work-item queue file (JSON)
    pub work_items: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub bundles: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub secret: Option<String>,
    pub smtp_server: Option<String>,
    pub smtp_port: Option<u16>,
    pub tls: Option<TlsMode>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptConfig {
    /// External command; the built-in script runs when absent
    pub command: Option<Vec<String>>,
    pub column: Option<String>,
    pub increment: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    pub secrets_seconds: Option<u64>,
    pub intake_seconds: Option<u64>,
    pub script_seconds: Option<u64>,
    pub notify_seconds: Option<u64>,
    pub http_seconds: Option<u64>,
}

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain connection upgraded with STARTTLS (port 587)
    Starttls,
    /// Implicit TLS (port 465)
    Tls,
    /// Unencrypted, for local test relays only
    None,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Project root; relative paths and external scripts start here
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub secrets_file: PathBuf,
    pub work_items_file: PathBuf,
    /// Business-domain bundles resolved before the script runs
    pub bundles: Vec<String>,
    pub email: EmailSettings,
    pub script: ScriptSettings,
    pub timeouts: TimeoutSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailSettings {
    pub secret: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub tls: TlsMode,
    pub subject: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            secret: DEFAULT_EMAIL_SECRET.to_string(),
            smtp_server: DEFAULT_SMTP_SERVER.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            tls: TlsMode::Starttls,
            subject: DEFAULT_SUBJECT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptSettings {
    pub command: Option<Vec<String>>,
    pub column: String,
    pub increment: f64,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            command: None,
            column: "Value".to_string(),
            increment: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeoutSettings {
    pub secrets_seconds: u64,
    pub intake_seconds: u64,
    pub script_seconds: u64,
    pub notify_seconds: u64,
    pub http_seconds: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            secrets_seconds: 30,
            intake_seconds: 30,
            script_seconds: 600,
            notify_seconds: 60,
            http_seconds: 30,
        }
    }
}

impl TimeoutSettings {
    pub fn secrets(&self) -> Duration {
        Duration::from_secs(self.secrets_seconds)
    }

    pub fn intake(&self) -> Duration {
        Duration::from_secs(self.intake_seconds)
    }

    pub fn script(&self) -> Duration {
        Duration::from_secs(self.script_seconds)
    }

    pub fn notify(&self) -> Duration {
        Duration::from_secs(self.notify_seconds)
    }

    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_seconds)
    }
}

impl ResolvedConfig {
    /// Defaults rooted at `base`, before any file or env override
    pub fn defaults(base: &Path) -> Self {
        Self {
            root: base.to_path_buf(),
            output_dir: base.join("output"),
            secrets_file: base.join("devdata").join("vault.json"),
            work_items_file: base.join("devdata").join("work-items.json"),
            bundles: vec!["domain_one".to_string(), "domain_two".to_string()],
            email: EmailSettings::default(),
            script: ScriptSettings::default(),
            timeouts: TimeoutSettings::default(),
            config_file: None,
        }
    }

    /// Queue release log inside the output directory
    pub fn releases_file(&self) -> PathBuf {
        self.output_dir.join("work_item_releases.jsonl")
    }

    pub fn log_file(&self) -> PathBuf {
        self.output_dir.join("out.log")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".taskwrap").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's base
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Project root for a config file: the parent of `.taskwrap/`, otherwise
/// the file's own directory
fn config_base(config_path: &Path) -> PathBuf {
    let dir = config_path.parent().unwrap_or(Path::new("."));
    if dir.file_name().map(|n| n == ".taskwrap").unwrap_or(false) {
        dir.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        dir.to_path_buf()
    }
}

/// Merge a parsed config file over the defaults
fn apply_file(config: &mut ResolvedConfig, file: ConfigFile, base: &Path) {
    if let Some(ref output) = file.paths.output {
        config.output_dir = resolve_path(base, output);
    }
    if let Some(ref secrets) = file.paths.secrets {
        config.secrets_file = resolve_path(base, secrets);
    }
    if let Some(ref work_items) = file.paths.work_items {
        config.work_items_file = resolve_path(base, work_items);
    }

    if let Some(bundles) = file.credentials.and_then(|c| c.bundles) {
        config.bundles = bundles;
    }

    if let Some(email) = file.email {
        let defaults = EmailSettings::default();
        config.email = EmailSettings {
            secret: email.secret.unwrap_or(defaults.secret),
            smtp_server: email.smtp_server.unwrap_or(defaults.smtp_server),
            smtp_port: email.smtp_port.unwrap_or(defaults.smtp_port),
            tls: email.tls.unwrap_or(defaults.tls),
            subject: email.subject.unwrap_or(defaults.subject),
        };
    }

    if let Some(script) = file.script {
        let defaults = ScriptSettings::default();
        config.script = ScriptSettings {
            command: script.command.filter(|c| !c.is_empty()),
            column: script.column.unwrap_or(defaults.column),
            increment: script.increment.unwrap_or(defaults.increment),
        };
    }

    if let Some(timeouts) = file.timeouts {
        let defaults = TimeoutSettings::default();
        config.timeouts = TimeoutSettings {
            secrets_seconds: timeouts.secrets_seconds.unwrap_or(defaults.secrets_seconds),
            intake_seconds: timeouts.intake_seconds.unwrap_or(defaults.intake_seconds),
            script_seconds: timeouts.script_seconds.unwrap_or(defaults.script_seconds),
            notify_seconds: timeouts.notify_seconds.unwrap_or(defaults.notify_seconds),
            http_seconds: timeouts.http_seconds.unwrap_or(defaults.http_seconds),
        };
    }
}

/// Apply environment variable overrides
fn apply_env(config: &mut ResolvedConfig) -> Result<()> {
    if let Ok(output) = std::env::var("TASKWRAP_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(output);
    }
    if let Ok(secrets) = std::env::var("RPA_SECRET_FILE") {
        config.secrets_file = PathBuf::from(secrets);
    }
    if let Ok(work_items) = std::env::var("RPA_INPUT_WORKITEM_PATH") {
        config.work_items_file = PathBuf::from(work_items);
    }
    if let Ok(server) = std::env::var("TASKWRAP_SMTP_SERVER") {
        config.email.smtp_server = server;
    }
    if let Ok(port) = std::env::var("TASKWRAP_SMTP_PORT") {
        config.email.smtp_port = port
            .parse()
            .with_context(|| format!("Invalid TASKWRAP_SMTP_PORT: {}", port))?;
    }
    Ok(())
}

/// Load configuration from all sources.
///
/// `explicit` is the config file from `--config` or `TASKWRAP_CONFIG`
/// (both handled by the CLI); without it directory discovery is tried.
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let config_file = explicit.map(Path::to_path_buf).or_else(find_config_file);

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    let mut config = if let Some(ref config_path) = config_file {
        let file = load_config_file(config_path)?;
        let base = config_base(config_path);
        let base = if base.is_absolute() { base } else { cwd.join(base) };

        let mut config = ResolvedConfig::defaults(&base);
        apply_file(&mut config, file, &base);
        config
    } else {
        ResolvedConfig::defaults(&cwd)
    };

    apply_env(&mut config)?;
    config.config_file = config_file;

    check_bundle_names(config.bundles.iter().map(String::as_str))?;
    if config.bundles.iter().any(|b| b == &config.email.secret) {
        anyhow::bail!(
            "Email secret '{}' must not also be a business credential bundle",
            config.email.secret
        );
    }

    Ok(config)
}
