//! Credential bundles and the environment propagation table.
//!
//! A bundle resolved from the secret store is handed to the business script
//! as `{BUNDLE}_USER`, `{BUNDLE}_PASSWORD` and `{BUNDLE}_URL` entries, where
//! `BUNDLE` is the bundle name uppercased. The table is passed explicitly to
//! the script boundary; it never touches the wrapper's own process
//! environment.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WrapperError;

/// A named group of credential fields as returned by a secret store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub values: BTreeMap<String, String>,
}

impl Secret {
    pub fn new(name: impl Into<String>, values: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Get a field that the caller cannot do without
    pub fn require(&self, field: &str) -> Result<String, WrapperError> {
        self.get(field)
            .map(str::to_string)
            .ok_or_else(|| WrapperError::InvalidSecret {
                name: self.name.clone(),
                field: field.to_string(),
            })
    }
}

/// Business-domain credentials: `{user, password, url}`
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub name: String,
    pub user: String,
    pub password: String,
    pub url: String,
}

impl CredentialBundle {
    pub fn from_secret(secret: &Secret) -> Result<Self, WrapperError> {
        Ok(Self {
            name: secret.name.clone(),
            user: secret.require("user")?,
            password: secret.require("password")?,
            url: secret.require("url")?,
        })
    }
}

// Keep passwords out of logs and panic messages.
impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"****")
            .field("url", &self.url)
            .finish()
    }
}

/// Email transport credentials: `{user, password}`
#[derive(Clone, PartialEq, Eq)]
pub struct EmailCredential {
    pub user: String,
    pub password: String,
}

impl EmailCredential {
    pub fn from_secret(secret: &Secret) -> Result<Self, WrapperError> {
        Ok(Self {
            user: secret.require("user")?,
            password: secret.require("password")?,
        })
    }
}

impl fmt::Debug for EmailCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailCredential")
            .field("user", &self.user)
            .field("password", &"****")
            .finish()
    }
}

/// Validate a bundle name and return its environment key prefix
pub fn env_prefix(bundle: &str) -> Result<String, WrapperError> {
    let valid = !bundle.is_empty()
        && bundle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(WrapperError::InvalidBundleName(bundle.to_string()));
    }
    Ok(bundle.to_ascii_uppercase())
}

/// Reject bundle lists where two names share the same key prefix
pub fn check_bundle_names<'a>(
    bundles: impl IntoIterator<Item = &'a str>,
) -> Result<(), WrapperError> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    for bundle in bundles {
        let prefix = env_prefix(bundle)?;
        match seen.get(&prefix) {
            Some(first) if *first != bundle => {
                return Err(WrapperError::BundleCollision {
                    first: first.to_string(),
                    second: bundle.to_string(),
                });
            }
            _ => {
                seen.insert(prefix, bundle);
            }
        }
    }
    Ok(())
}

/// Environment propagation table for one run
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialEnv {
    vars: BTreeMap<String, String>,
    /// prefix -> bundle name that owns it
    owners: BTreeMap<String, String>,
}

impl CredentialEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the three entries for `bundle`.
    ///
    /// Re-inserting the same bundle overwrites its entries. A different
    /// bundle name that uppercases to an owned prefix is rejected.
    pub fn insert(&mut self, bundle: &CredentialBundle) -> Result<(), WrapperError> {
        let prefix = env_prefix(&bundle.name)?;
        if let Some(owner) = self.owners.get(&prefix) {
            if owner != &bundle.name {
                return Err(WrapperError::BundleCollision {
                    first: owner.clone(),
                    second: bundle.name.clone(),
                });
            }
        }

        self.vars
            .insert(format!("{}_USER", prefix), bundle.user.clone());
        self.vars
            .insert(format!("{}_PASSWORD", prefix), bundle.password.clone());
        self.vars
            .insert(format!("{}_URL", prefix), bundle.url.clone());
        self.owners.insert(prefix, bundle.name.clone());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Look up one field (`user`, `password`, `url`) of a bundle
    pub fn field(&self, bundle: &str, field: &str) -> Option<&str> {
        let key = format!("{}_{}", bundle.to_ascii_uppercase(), field.to_ascii_uppercase());
        self.get(&key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Key/value pairs, for exporting to a child process environment
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Bundle names recorded in the table
    pub fn bundles(&self) -> impl Iterator<Item = &str> {
        self.owners.values().map(String::as_str)
    }
}

impl fmt::Debug for CredentialEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEnv")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .finish()
    }
}
