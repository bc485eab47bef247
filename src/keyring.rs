//! Current and legacy key selection per algorithm

use crate::config::{ConfigError, KasConfig, KeyringEntry};
use opentdf_trust::{Algorithm, KeyIdentifier};
use tracing::{info, warn};

/// One resolved keyring entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringKey {
    pub algorithm: Algorithm,
    pub kid: KeyIdentifier,
    /// Accepted on decrypt only, never chosen as the current key
    pub legacy: bool,
}

/// Immutable keyring built once at startup
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    entries: Vec<KeyringKey>,
}

impl Keyring {
    /// Upgrade the configured keyring
    ///
    /// `fallback_kid` names the first loaded key of an algorithm; it is used
    /// when neither a keyring nor a deprecated cert id is configured.
    pub fn from_config(
        kas: &KasConfig,
        fallback_kid: impl Fn(Algorithm) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let entries: Vec<KeyringEntry> = match (kas.eccertid.is_empty(), kas.keyring.is_empty()) {
            (false, false) => {
                return Err(ConfigError::invalid(
                    "kas.eccertid",
                    "specify keyring or eccertid, not both",
                ))
            }
            (_, true) => {
                let mut entries = Vec::new();
                for (deprecated, algorithm) in [
                    (&kas.eccertid, Algorithm::EcP256),
                    (&kas.rsacertid, Algorithm::Rsa2048),
                ] {
                    let kid = if deprecated.is_empty() {
                        fallback_kid(algorithm)
                    } else {
                        Some(deprecated.clone())
                    };
                    match kid {
                        Some(kid) => {
                            info!(%algorithm, %kid, "inferred keyring entry");
                            entries.push(KeyringEntry::new(algorithm.as_str(), kid.clone(), false));
                            entries.push(KeyringEntry::new(algorithm.as_str(), kid, true));
                        }
                        None => warn!(%algorithm, "no default key found for algorithm"),
                    }
                }
                entries
            }
            (true, false) => {
                let mut entries = kas.keyring.clone();
                entries.extend(infer_legacy_keys(&kas.keyring));
                entries
            }
        };

        let entries = entries
            .into_iter()
            .map(|entry| {
                let algorithm = entry
                    .alg
                    .parse::<Algorithm>()
                    .map_err(|e| ConfigError::invalid("kas.keyring.alg", e.to_string()))?;
                Ok(KeyringKey {
                    algorithm,
                    kid: KeyIdentifier::new(entry.kid),
                    legacy: entry.legacy,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[KeyringKey] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Non-legacy key ids
    pub fn defaults(&self) -> impl Iterator<Item = &KeyIdentifier> {
        self.entries.iter().filter(|e| !e.legacy).map(|e| &e.kid)
    }

    pub fn legacy(&self) -> impl Iterator<Item = &KeyIdentifier> {
        self.entries.iter().filter(|e| e.legacy).map(|e| &e.kid)
    }

    /// First non-legacy key for `algorithm`
    pub fn current(&self, algorithm: Algorithm) -> Option<&KeyIdentifier> {
        self.entries
            .iter()
            .find(|e| !e.legacy && e.algorithm == algorithm)
            .map(|e| &e.kid)
    }
}

/// Legacy copies of every entry, unless some entry is already legacy
fn infer_legacy_keys(keys: &[KeyringEntry]) -> Vec<KeyringEntry> {
    if keys.iter().any(|k| k.legacy) {
        return Vec::new();
    }
    keys.iter()
        .map(|k| KeyringEntry {
            legacy: true,
            ..k.clone()
        })
        .collect()
}
