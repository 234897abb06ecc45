//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use taskwrap::adapters::{
    FileWorkItems, HttpProbe, MailTransport, MailTransportFactory, OutgoingMail, StaticVault,
};
use taskwrap::config::{ScriptSettings, TimeoutSettings, DEFAULT_EMAIL_SECRET, DEFAULT_SUBJECT};
use taskwrap::core::{CompletionNotifier, Orchestrator, SecretResolver, WorkItemIntake};
use taskwrap::script::spreadsheet::{write_sheet, Cell, Sheet};
use taskwrap::script::{BusinessScript, MockScript};

pub const DOMAIN_ONE_URL: &str = "https://one.test/health";
pub const DOMAIN_TWO_URL: &str = "https://two.test/health";
pub const BOT_ACCOUNT: &str = "bot@example.com";
pub const REQUESTER: &str = "requester@example.com";

/// HTTP probe that records every URL and answers with a fixed status
#[derive(Clone, Default)]
pub struct RecordingProbe {
    pub urls: Arc<Mutex<Vec<String>>>,
}

impl RecordingProbe {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpProbe for RecordingProbe {
    async fn get(&self, url: &str) -> Result<u16> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(200)
    }
}

/// Mail transport factory that records instead of sending
#[derive(Clone, Default)]
pub struct RecordingMail {
    pub sent: Arc<Mutex<Vec<OutgoingMail>>>,
    pub accounts: Arc<Mutex<Vec<(String, String)>>>,
    pub reject_auth: bool,
    pub reject_send: bool,
    /// Hold every send for this long before recording it
    pub send_delay: Option<std::time::Duration>,
}

impl RecordingMail {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn accounts(&self) -> Vec<(String, String)> {
        self.accounts.lock().unwrap().clone()
    }
}

struct RecordingTransport {
    mail: RecordingMail,
}

impl MailTransportFactory for RecordingMail {
    fn connect(&self, account: &str, password: &str) -> Result<Box<dyn MailTransport>> {
        self.accounts
            .lock()
            .unwrap()
            .push((account.to_string(), password.to_string()));
        Ok(Box::new(RecordingTransport { mail: self.clone() }))
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn authorize(&self) -> Result<()> {
        if self.mail.reject_auth {
            anyhow::bail!("535 Username and Password not accepted");
        }
        Ok(())
    }

    async fn send_message(&self, mail: &OutgoingMail) -> Result<()> {
        if let Some(delay) = self.mail.send_delay {
            tokio::time::sleep(delay).await;
        }
        if self.mail.reject_send {
            anyhow::bail!("554 Transaction failed");
        }
        for attachment in &mail.attachments {
            anyhow::ensure!(attachment.exists(), "attachment missing: {}", attachment.display());
        }
        self.mail.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// Vault holding both domains and the email secret
pub fn full_vault() -> StaticVault {
    StaticVault::new()
        .with_secret(
            "domain_one",
            [("user", "one-user"), ("password", "one-pass"), ("url", DOMAIN_ONE_URL)],
        )
        .with_secret(
            "domain_two",
            [("user", "two-user"), ("password", "two-pass"), ("url", DOMAIN_TWO_URL)],
        )
        .with_secret(
            DEFAULT_EMAIL_SECRET,
            [("user", BOT_ACCOUNT), ("password", "app-password")],
        )
}

/// The two-row sheet from the reference scenario
pub fn two_row_sheet() -> Sheet {
    Sheet {
        headers: vec!["Name".to_string(), "Value".to_string()],
        rows: vec![
            vec![Cell::Text("A".to_string()), Cell::Number(1.0)],
            vec![Cell::Text("B".to_string()), Cell::Number(2.0)],
        ],
    }
}

pub fn write_workbook(path: &Path, sheet: &Sheet) {
    write_sheet(path, sheet).unwrap();
}

/// Write a work-items file holding one item
pub fn write_work_items(dir: &Path, items: serde_json::Value) -> PathBuf {
    let path = dir.join("work-items.json");
    std::fs::write(&path, serde_json::to_string_pretty(&items).unwrap()).unwrap();
    path
}

/// Everything a run needs, rooted in a temp directory
pub struct Fixture {
    pub temp: TempDir,
    pub vault: StaticVault,
    pub probe: RecordingProbe,
    pub mail: RecordingMail,
    pub timeouts: TimeoutSettings,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
            vault: full_vault(),
            probe: RecordingProbe::default(),
            mail: RecordingMail::default(),
            timeouts: TimeoutSettings::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.temp.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir().join("output")
    }

    pub fn releases_file(&self) -> PathBuf {
        self.output_dir().join("work_item_releases.jsonl")
    }

    pub fn queue(&self) -> FileWorkItems {
        FileWorkItems::new(self.dir().join("work-items.json"), self.releases_file())
    }

    pub fn builtin_script(&self) -> Box<dyn BusinessScript> {
        Box::new(MockScript::new(
            self.output_dir(),
            &ScriptSettings::default(),
            vec!["domain_one".to_string(), "domain_two".to_string()],
            Arc::new(self.probe.clone()),
        ))
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_with(self.builtin_script())
    }

    pub fn orchestrator_with(&self, script: Box<dyn BusinessScript>) -> Orchestrator {
        let secrets = Arc::new(SecretResolver::new(Arc::new(self.vault.clone())));
        let notifier = CompletionNotifier::new(
            secrets.clone(),
            Arc::new(self.mail.clone()),
            DEFAULT_EMAIL_SECRET,
            DEFAULT_SUBJECT,
        );
        Orchestrator::new(
            secrets,
            vec!["domain_one".to_string(), "domain_two".to_string()],
            WorkItemIntake::new(Arc::new(self.queue())),
            script,
            notifier,
            self.timeouts.clone(),
        )
    }

    /// Input workbook plus a single work item pointing at it
    pub fn seed_item(&self, payload: serde_json::Value) -> PathBuf {
        let input = self.dir().join("input.xlsx");
        write_workbook(&input, &two_row_sheet());
        write_work_items(
            self.dir(),
            serde_json::json!([{ "id": "wi-1", "files": ["input.xlsx"], "payload": payload }]),
        );
        input
    }
}

/// Accepts HTTP connections and never answers
pub async fn silent_listener() -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

pub fn requester_payload() -> serde_json::Value {
    serde_json::json!({ "email": { "from": { "address": REQUESTER } } })
}
