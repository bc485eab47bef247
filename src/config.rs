//! Service configuration
//!
//! Loaded once at startup from JSON, optionally overridden from the
//! environment, then validated. Nothing here changes while requests run.

use crate::access::AuthorizationConfig;
use crate::logging::LoggingConfig;
use opentdf_crypto::BindingEncoding;
use opentdf_trust::{Algorithm, PlatformConfig, TransitConfig};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration field '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error("key setup failed: {0}")]
    Key(#[from] opentdf_trust::TrustError),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Where NanoTDF access decisions are made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NanoAccess {
    /// Enforced before the request reaches the KAS; no decision call here
    #[default]
    Upstream,
    /// Decode the header's embedded policy and ask the decision gate
    EmbeddedPolicy,
}

fn deserialize_binding_encoding<'de, D>(deserializer: D) -> Result<BindingEncoding, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    value.parse().map_err(serde::de::Error::custom)
}

/// One `{alg, kid, legacy}` keyring entry as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyringEntry {
    pub alg: String,
    pub kid: String,
    #[serde(default)]
    pub legacy: bool,
}

impl KeyringEntry {
    pub fn new(alg: impl Into<String>, kid: impl Into<String>, legacy: bool) -> Self {
        Self {
            alg: alg.into(),
            kid: kid.into(),
            legacy,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KasConfig {
    /// This KAS's own URI; key access URLs are compared against it
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub keyring: Vec<KeyringEntry>,
    /// Deprecated: use `keyring`
    #[serde(default)]
    pub eccertid: String,
    /// Deprecated: use `keyring`
    #[serde(default)]
    pub rsacertid: String,
    /// Accept `ec-wrapped` key access objects and EC client keys for TDF3
    #[serde(default)]
    pub ec_tdf_enabled: bool,
    #[serde(default)]
    pub nano_access: NanoAccess,
    #[serde(default, deserialize_with = "deserialize_binding_encoding")]
    pub binding_encoding: BindingEncoding,
}

/// An in-process key loaded from a PEM file
#[derive(Debug, Clone, Deserialize)]
pub struct KeyFileConfig {
    pub kid: String,
    pub alg: String,
    /// Path to the private key PEM
    pub private: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CryptoConfig {
    #[serde(default)]
    pub keys: Vec<KeyFileConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub kas: KasConfig,
    #[serde(default)]
    pub crypto: CryptoConfig,
    #[serde(default)]
    pub authorization: Option<AuthorizationConfig>,
    #[serde(default)]
    pub platform: Option<PlatformConfig>,
    #[serde(default)]
    pub transit: Option<TransitConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply `OPENTDF_*` and `VAULT_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(uri) = lookup("OPENTDF_KAS_URI") {
            self.kas.uri = uri;
        }
        if let Some(endpoint) = lookup("OPENTDF_AUTHORIZATION_ENDPOINT") {
            match self.authorization.as_mut() {
                Some(authorization) => authorization.endpoint = endpoint,
                None => self.authorization = Some(AuthorizationConfig::new(endpoint)),
            }
        }
        if let Some(endpoint) = lookup("OPENTDF_PLATFORM_ENDPOINT") {
            match self.platform.as_mut() {
                Some(platform) => platform.endpoint = endpoint,
                None => self.platform = Some(PlatformConfig::new(endpoint)),
            }
        }
        if let Some(address) = lookup("VAULT_ADDR") {
            match self.transit.as_mut() {
                Some(transit) => transit.address = address,
                None => self.transit = Some(TransitConfig::new(address, "")),
            }
        }
        if let Some(transit) = self.transit.as_mut() {
            if let Some(token) = lookup("VAULT_TOKEN") {
                transit.token = token;
            }
            if let Some(namespace) = lookup("VAULT_NAMESPACE") {
                transit.namespace = Some(namespace);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.kas.eccertid.is_empty() && !self.kas.keyring.is_empty() {
            return Err(ConfigError::invalid(
                "kas.eccertid",
                "specify keyring or eccertid, not both",
            ));
        }
        for entry in &self.kas.keyring {
            entry
                .alg
                .parse::<Algorithm>()
                .map_err(|e| ConfigError::invalid("kas.keyring.alg", e.to_string()))?;
            if entry.kid.is_empty() {
                return Err(ConfigError::invalid("kas.keyring.kid", "must not be empty"));
            }
        }

        let mut kids = HashSet::new();
        for key in &self.crypto.keys {
            key.alg
                .parse::<Algorithm>()
                .map_err(|e| ConfigError::invalid("crypto.keys.alg", e.to_string()))?;
            if !kids.insert(key.kid.as_str()) {
                return Err(ConfigError::invalid(
                    "crypto.keys.kid",
                    format!("duplicate key id {}", key.kid),
                ));
            }
        }

        if let Some(authorization) = &self.authorization {
            if authorization.endpoint.is_empty() {
                return Err(ConfigError::invalid("authorization.endpoint", "must not be empty"));
            }
        }
        if let Some(platform) = &self.platform {
            if platform.endpoint.is_empty() {
                return Err(ConfigError::invalid("platform.endpoint", "must not be empty"));
            }
        }
        if let Some(transit) = &self.transit {
            if transit.address.is_empty() {
                return Err(ConfigError::invalid("transit.address", "must not be empty"));
            }
        }
        Ok(())
    }
}
