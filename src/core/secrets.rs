//! Secret resolution and credential propagation.

use std::sync::Arc;

use tracing::debug;

use crate::adapters::SecretStore;
use crate::domain::{CredentialBundle, CredentialEnv, EmailCredential, Secret};
use crate::error::WrapperError;

/// Resolves named credential bundles from a secret store
pub struct SecretResolver {
    store: Arc<dyn SecretStore>,
}

impl SecretResolver {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    async fn fetch(&self, name: &str) -> Result<Secret, WrapperError> {
        self.store
            .get_secret(name)
            .await
            .map_err(|e| WrapperError::SecretStoreFailed {
                name: name.to_string(),
                reason: format!("{:#}", e),
            })?
            .ok_or_else(|| WrapperError::SecretNotFound {
                name: name.to_string(),
            })
    }

    /// Resolve `bundle` and write its three entries into `env`.
    ///
    /// The entries are written only after the secret has been fetched and
    /// validated, so a failed call leaves `env` untouched.
    pub async fn resolve(
        &self,
        bundle: &str,
        env: &mut CredentialEnv,
    ) -> Result<CredentialBundle, WrapperError> {
        crate::domain::credentials::env_prefix(bundle)?;
        let secret = self.fetch(bundle).await?;
        let credentials = CredentialBundle::from_secret(&secret)?;

        debug!(
            secret = bundle,
            store = self.store.name(),
            "Setting credential entries from secret"
        );
        env.insert(&credentials)?;
        Ok(credentials)
    }

    /// Resolve every bundle in order, stopping at the first failure
    pub async fn resolve_all(
        &self,
        bundles: &[String],
        env: &mut CredentialEnv,
    ) -> Result<Vec<CredentialBundle>, WrapperError> {
        let mut resolved = Vec::with_capacity(bundles.len());
        for bundle in bundles {
            resolved.push(self.resolve(bundle, env).await?);
        }
        Ok(resolved)
    }

    /// Resolve the email transport secret (`{user, password}`)
    pub async fn resolve_email(&self, name: &str) -> Result<EmailCredential, WrapperError> {
        let secret = self.fetch(name).await?;
        EmailCredential::from_secret(&secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticVault;
    use anyhow::Result;
    use async_trait::async_trait;

    fn resolver() -> SecretResolver {
        let vault = StaticVault::new()
            .with_secret(
                "domain_one",
                [("user", "u1"), ("password", "p1"), ("url", "https://one.test")],
            )
            .with_secret("partial", [("user", "u2")])
            .with_secret(
                "email_app_password",
                [("user", "bot@example.com"), ("password", "app")],
            );
        SecretResolver::new(Arc::new(vault))
    }

    struct BrokenStore;

    #[async_trait]
    impl SecretStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn get_secret(&self, _name: &str) -> Result<Option<Secret>> {
            anyhow::bail!("vault offline")
        }
    }

    #[tokio::test]
    async fn test_resolve_sets_three_entries() {
        let mut env = CredentialEnv::new();
        let bundle = resolver().resolve("domain_one", &mut env).await.unwrap();

        assert_eq!(bundle.user, "u1");
        assert_eq!(env.len(), 3);
        assert_eq!(env.get("DOMAIN_ONE_USER"), Some("u1"));
        assert_eq!(env.get("DOMAIN_ONE_PASSWORD"), Some("p1"));
        assert_eq!(env.get("DOMAIN_ONE_URL"), Some("https://one.test"));
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let resolver = resolver();
        let mut env = CredentialEnv::new();
        let first = resolver.resolve("domain_one", &mut env).await.unwrap();
        let snapshot = env.clone();
        let second = resolver.resolve("domain_one", &mut env).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(env, snapshot);
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let mut env = CredentialEnv::new();
        let err = resolver().resolve("domain_two", &mut env).await.unwrap_err();
        assert!(matches!(err, WrapperError::SecretNotFound { ref name } if name == "domain_two"));
        assert!(env.is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_secret_leaves_env_untouched() {
        let mut env = CredentialEnv::new();
        let err = resolver().resolve("partial", &mut env).await.unwrap_err();
        assert!(matches!(err, WrapperError::InvalidSecret { .. }));
        assert!(env.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure() {
        let resolver = SecretResolver::new(Arc::new(BrokenStore));
        let mut env = CredentialEnv::new();
        let err = resolver.resolve("domain_one", &mut env).await.unwrap_err();
        assert!(matches!(err, WrapperError::SecretStoreFailed { .. }));
        assert!(err.to_string().contains("vault offline"));
    }

    #[tokio::test]
    async fn test_resolve_email_shape() {
        let email = resolver().resolve_email("email_app_password").await.unwrap();
        assert_eq!(email.user, "bot@example.com");
        assert_eq!(email.password, "app");
    }
}
