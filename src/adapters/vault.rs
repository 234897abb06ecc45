//! Secret store adapters.
//!
//! `FileVault` reads a local secrets file, the same layout the automation
//! platform uses for local development:
//!
//! ```json
//! { "domain_one": { "user": "u", "password": "p", "url": "https://..." } }
//! ```
//!
//! Files ending in `.yaml`/`.yml` are parsed as YAML, everything else as
//! JSON. The file is read on every lookup so edits are picked up between
//! runs without a restart.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::SecretStore;
use crate::domain::Secret;

type SecretFile = HashMap<String, BTreeMap<String, String>>;

/// Secrets read from a local JSON or YAML file
pub struct FileVault {
    path: PathBuf,
}

impl FileVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_yaml(&self) -> bool {
        matches!(
            self.path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        )
    }

    async fn load(&self) -> Result<SecretFile> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read secrets file: {}", self.path.display()))?;

        if self.is_yaml() {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse secrets file: {}", self.path.display()))
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse secrets file: {}", self.path.display()))
        }
    }
}

#[async_trait]
impl SecretStore for FileVault {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_secret(&self, name: &str) -> Result<Option<Secret>> {
        debug!(path = %self.path.display(), secret = name, "Reading secrets file");
        let mut secrets = self.load().await?;
        Ok(secrets
            .remove(name)
            .map(|values| Secret::new(name, values)))
    }
}

/// Secrets held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticVault {
    secrets: HashMap<String, BTreeMap<String, String>>,
}

impl StaticVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret from field/value pairs
    pub fn with_secret<'a>(
        mut self,
        name: &str,
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let values = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.secrets.insert(name.to_string(), values);
        self
    }
}

#[async_trait]
impl SecretStore for StaticVault {
    fn name(&self) -> &str {
        "static"
    }

    async fn get_secret(&self, name: &str) -> Result<Option<Secret>> {
        Ok(self
            .secrets
            .get(name)
            .map(|values| Secret::new(name, values.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_json_vault_lookup() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vault.json");
        tokio::fs::write(
            &path,
            r#"{"domain_one": {"user": "u1", "password": "p1", "url": "https://one.test"}}"#,
        )
        .await
        .unwrap();

        let vault = FileVault::new(&path);
        let secret = vault.get_secret("domain_one").await.unwrap().unwrap();
        assert_eq!(secret.get("user"), Some("u1"));
        assert_eq!(secret.get("url"), Some("https://one.test"));

        assert!(vault.get_secret("domain_two").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_yaml_vault_lookup() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vault.yaml");
        tokio::fs::write(
            &path,
            "email_app_password:\n  user: bot@example.com\n  password: app-pass\n",
        )
        .await
        .unwrap();

        let vault = FileVault::new(&path);
        let secret = vault.get_secret("email_app_password").await.unwrap().unwrap();
        assert_eq!(secret.get("user"), Some("bot@example.com"));
        assert_eq!(secret.get("url"), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let vault = FileVault::new("/nonexistent/vault.json");
        assert!(vault.get_secret("domain_one").await.is_err());
    }

    #[tokio::test]
    async fn test_static_vault() {
        let vault = StaticVault::new().with_secret("domain_one", [("user", "u1")]);
        let secret = vault.get_secret("domain_one").await.unwrap().unwrap();
        assert_eq!(secret.name, "domain_one");
        assert_eq!(secret.get("user"), Some("u1"));
        assert!(vault.get_secret("other").await.unwrap().is_none());
    }
}
