//! Resolution of credentials referenced from configuration.
//!
//! A credential can be given three ways, checked in this order:
//!
//! 1. inline value (`apiKey`), handy for local runs
//! 2. file path (`apiKeyFile`), for mounted secrets
//! 3. environment variable name (`apiKeyEnvVar`)
//!
//! Resolved values are wrapped in [`SecretString`] so they never show up in
//! `Debug` output or logs.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No credential source configured (need an inline value, a file path or an env var name)")]
    NoSourceProvided,

    #[error("Failed to read credential from file '{}': {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential file '{}' is empty", path.display())]
    EmptyFile { path: PathBuf },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a credential comes from, as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    #[serde(default, rename = "apiKey", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, rename = "apiKeyFile", skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, rename = "apiKeyEnvVar", skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

impl SecretSource {
    pub fn from_env_var(name: &str) -> Self {
        Self {
            env_var: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// True when at least one non-empty source is configured.
    pub fn is_configured(&self) -> bool {
        [&self.value, &self.file, &self.env_var]
            .iter()
            .any(|s| s.as_deref().is_some_and(|s| !s.is_empty()))
    }

    pub fn resolve(&self) -> Result<SecretString> {
        resolve_secret(
            self.value.as_deref(),
            self.file.as_deref(),
            self.env_var.as_deref(),
        )
    }

    /// Like [`resolve`](Self::resolve), but an unconfigured source is `None`.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>> {
        match self.resolve() {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Resolves a credential from the first non-empty source.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let path = expand_home(path);
        let content = std::fs::read_to_string(&path).map_err(|source| SecretError::FileRead {
            path: path.clone(),
            source,
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::EmptyFile { path });
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    if let Some(name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Expands a leading `~` to the current user's home directory.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
