//! Key metadata
//!
//! [`KeyDetails`] is what an index returns: identity, algorithm, the backend
//! ("mode") that can use the key, and opaque provider-specific contexts. It
//! carries no usable private key material.

use crate::error::TrustError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use opentdf_crypto::EcCurve;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque key name, unique within an index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyIdentifier(String);

impl KeyIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        KeyIdentifier(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyIdentifier {
    fn from(id: &str) -> Self {
        KeyIdentifier(id.to_string())
    }
}

impl From<String> for KeyIdentifier {
    fn from(id: String) -> Self {
        KeyIdentifier(id)
    }
}

/// Key algorithms known to the KAS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Rsa2048,
    Rsa4096,
    EcP256,
    EcP384,
    EcP521,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Rsa2048,
        Algorithm::Rsa4096,
        Algorithm::EcP256,
        Algorithm::EcP384,
        Algorithm::EcP521,
    ];

    /// Request and configuration form, e.g. `rsa:2048`
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Rsa2048 => "rsa:2048",
            Algorithm::Rsa4096 => "rsa:4096",
            Algorithm::EcP256 => "ec:secp256r1",
            Algorithm::EcP384 => "ec:secp384r1",
            Algorithm::EcP521 => "ec:secp521r1",
        }
    }

    /// Platform registry enum form, e.g. `ALGORITHM_RSA_2048`
    pub fn registry_name(self) -> &'static str {
        match self {
            Algorithm::Rsa2048 => "ALGORITHM_RSA_2048",
            Algorithm::Rsa4096 => "ALGORITHM_RSA_4096",
            Algorithm::EcP256 => "ALGORITHM_EC_P256",
            Algorithm::EcP384 => "ALGORITHM_EC_P384",
            Algorithm::EcP521 => "ALGORITHM_EC_P521",
        }
    }

    pub fn is_rsa(self) -> bool {
        matches!(self, Algorithm::Rsa2048 | Algorithm::Rsa4096)
    }

    pub fn is_ec(self) -> bool {
        !self.is_rsa()
    }

    pub fn ec_curve(self) -> Option<EcCurve> {
        match self {
            Algorithm::EcP256 => Some(EcCurve::P256),
            Algorithm::EcP384 => Some(EcCurve::P384),
            Algorithm::EcP521 => Some(EcCurve::P521),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|alg| alg.as_str() == s || alg.registry_name() == s)
            .ok_or_else(|| TrustError::UnsupportedAlgorithm(s.to_string()))
    }
}

/// Public key export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// SPKI PEM
    Pkcs8,
    Jwk,
}

/// Metadata for one key, immutable once issued by an index
#[derive(Clone)]
pub struct KeyDetails {
    id: KeyIdentifier,
    algorithm: Algorithm,
    legacy: bool,
    mode: String,
    provider_config: serde_json::Value,
    private_key_ctx: Vec<u8>,
    public_key_pem: String,
}

impl KeyDetails {
    pub fn new(id: impl Into<KeyIdentifier>, algorithm: Algorithm, public_key_pem: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            algorithm,
            legacy: false,
            mode: String::new(),
            provider_config: serde_json::Value::Null,
            private_key_ctx: Vec::new(),
            public_key_pem: public_key_pem.into(),
        }
    }

    pub fn with_legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn with_provider_config(mut self, config: serde_json::Value) -> Self {
        self.provider_config = config;
        self
    }

    pub fn with_private_key_ctx(mut self, ctx: Vec<u8>) -> Self {
        self.private_key_ctx = ctx;
        self
    }

    pub fn id(&self) -> &KeyIdentifier {
        &self.id
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Legacy keys are accepted for decrypt only
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Name of the key manager able to use this key; empty selects the default
    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn provider_config(&self) -> &serde_json::Value {
        &self.provider_config
    }

    /// Provider-specific wrapped private key context
    pub fn private_key_ctx(&self) -> &[u8] {
        &self.private_key_ctx
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    pub fn export_public_key(&self, format: KeyFormat) -> Result<String, TrustError> {
        match format {
            KeyFormat::Pkcs8 => Ok(self.public_key_pem.clone()),
            KeyFormat::Jwk if self.algorithm.is_rsa() => {
                let key = rsa::RsaPublicKey::from_public_key_pem(&self.public_key_pem)
                    .map_err(|e| TrustError::InvalidKey(e.to_string()))?;
                let jwk = serde_json::json!({
                    "kty": "RSA",
                    "kid": self.id.as_str(),
                    "n": URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
                    "e": URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
                });
                Ok(jwk.to_string())
            }
            KeyFormat::Jwk if self.algorithm == Algorithm::EcP256 => {
                let key = p256::PublicKey::from_public_key_pem(&self.public_key_pem)
                    .map_err(|e| TrustError::InvalidKey(e.to_string()))?;
                Ok(key.to_jwk_string())
            }
            KeyFormat::Jwk => Err(TrustError::UnsupportedAlgorithm(
                self.algorithm.to_string(),
            )),
        }
    }

    pub fn export_certificate(&self) -> Result<String, TrustError> {
        Err(TrustError::NotImplemented("export_certificate"))
    }
}

impl fmt::Debug for KeyDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDetails")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("legacy", &self.legacy)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::{EcKeyPair, RsaKeyPair};

    #[test]
    fn test_algorithm_forms() {
        assert_eq!("rsa:2048".parse::<Algorithm>().unwrap(), Algorithm::Rsa2048);
        assert_eq!(
            "ALGORITHM_EC_P256".parse::<Algorithm>().unwrap(),
            Algorithm::EcP256
        );
        assert!(matches!(
            "ec:curve25519".parse::<Algorithm>(),
            Err(TrustError::UnsupportedAlgorithm(_))
        ));
        assert_eq!(Algorithm::EcP384.ec_curve(), Some(EcCurve::P384));
        assert!(Algorithm::Rsa4096.is_rsa());
    }

    #[test]
    fn test_export_jwk_rsa() {
        let pair = RsaKeyPair::generate(2048).unwrap();
        let details = KeyDetails::new("r1", Algorithm::Rsa2048, pair.public_key_pem());

        let jwk: serde_json::Value =
            serde_json::from_str(&details.export_public_key(KeyFormat::Jwk).unwrap()).unwrap();
        assert_eq!(jwk["kty"], "RSA");
        assert_eq!(jwk["kid"], "r1");
        assert_eq!(jwk["e"], "AQAB");
    }

    #[test]
    fn test_export_jwk_ec_and_pem() {
        let pair = EcKeyPair::generate().unwrap();
        let details = KeyDetails::new("e1", Algorithm::EcP256, pair.public_key_pem());

        let jwk: serde_json::Value =
            serde_json::from_str(&details.export_public_key(KeyFormat::Jwk).unwrap()).unwrap();
        assert_eq!(jwk["kty"], "EC");
        assert_eq!(jwk["crv"], "P-256");
        assert_eq!(
            details.export_public_key(KeyFormat::Pkcs8).unwrap(),
            pair.public_key_pem()
        );
        assert!(matches!(
            details.export_certificate(),
            Err(TrustError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_debug_hides_contexts() {
        let details = KeyDetails::new("k", Algorithm::Rsa2048, "pem")
            .with_private_key_ctx(b"wrapped-secret".to_vec());
        let debug = format!("{:?}", details);
        assert!(!debug.contains("wrapped-secret"));
        assert!(debug.contains("Rsa2048"));
    }
}
