//! KAS keypairs held in process memory

use crate::error::TrustError;
use crate::key::Algorithm;
use opentdf_crypto::kem::rsa::parse_private_key_pem;
use p256::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use p256::{PublicKey as P256PublicKey, SecretKey as P256SecretKey};
use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

/// EC P-256 keypair for NanoTDF and EC-wrapped TDF3 keys
#[derive(Clone)]
pub struct EcKeyPair {
    private_key: P256SecretKey,
    public_key_pem: String,
}

impl EcKeyPair {
    pub fn generate() -> Result<Self, TrustError> {
        Self::from_secret_key(P256SecretKey::random(&mut OsRng))
    }

    /// Parse a PKCS#8 (`PRIVATE KEY`) or SEC1 (`EC PRIVATE KEY`) PEM
    pub fn from_pem(pem: &str) -> Result<Self, TrustError> {
        let private_key = P256SecretKey::from_pkcs8_pem(pem)
            .or_else(|_| P256SecretKey::from_sec1_pem(pem))
            .map_err(|e| TrustError::InvalidKey(format!("EC private key: {}", e)))?;
        Self::from_secret_key(private_key)
    }

    fn from_secret_key(private_key: P256SecretKey) -> Result<Self, TrustError> {
        let public_key_pem = private_key
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| TrustError::InvalidKey(e.to_string()))?;
        Ok(Self {
            private_key,
            public_key_pem,
        })
    }

    pub fn private_key(&self) -> &P256SecretKey {
        &self.private_key
    }

    pub fn public_key(&self) -> P256PublicKey {
        self.private_key.public_key()
    }

    /// SPKI PEM
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }
}

/// RSA keypair for TDF3 keys
#[derive(Clone)]
pub struct RsaKeyPair {
    private_key: RsaPrivateKey,
    public_key_pem: String,
}

impl RsaKeyPair {
    pub fn generate(bits: usize) -> Result<Self, TrustError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| TrustError::InvalidKey(e.to_string()))?;
        Self::from_private_key(private_key)
    }

    /// Parse a PKCS#8 or PKCS#1 PEM
    pub fn from_pem(pem: &str) -> Result<Self, TrustError> {
        Self::from_private_key(parse_private_key_pem(pem)?)
    }

    fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, TrustError> {
        let public_key_pem = RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| TrustError::InvalidKey(e.to_string()))?;
        Ok(Self {
            private_key,
            public_key_pem,
        })
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey::from(&self.private_key)
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    pub fn bits(&self) -> usize {
        self.private_key.size() * 8
    }
}

/// Either kind of KAS keypair
#[derive(Clone)]
pub enum KeyPair {
    Rsa(RsaKeyPair),
    Ec(EcKeyPair),
}

impl KeyPair {
    /// Parse a private key PEM of the given algorithm
    pub fn from_pem(algorithm: Algorithm, pem: &str) -> Result<Self, TrustError> {
        match algorithm {
            Algorithm::Rsa2048 | Algorithm::Rsa4096 => Ok(KeyPair::Rsa(RsaKeyPair::from_pem(pem)?)),
            Algorithm::EcP256 => Ok(KeyPair::Ec(EcKeyPair::from_pem(pem)?)),
            other => Err(TrustError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            KeyPair::Rsa(pair) if pair.bits() >= 4096 => Algorithm::Rsa4096,
            KeyPair::Rsa(_) => Algorithm::Rsa2048,
            KeyPair::Ec(_) => Algorithm::EcP256,
        }
    }

    pub fn public_key_pem(&self) -> &str {
        match self {
            KeyPair::Rsa(pair) => pair.public_key_pem(),
            KeyPair::Ec(pair) => pair.public_key_pem(),
        }
    }
}
