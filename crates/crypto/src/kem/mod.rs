//! Key Encapsulation Mechanisms (KEM)
//!
//! Abstractions for wrapping and unwrapping symmetric keys under the
//! asymmetric key types a KAS holds (RSA-OAEP and P-256 ECDH).

use thiserror::Error;

pub mod ec;
pub mod rsa;

/// KEM-related errors
#[derive(Debug, Error)]
pub enum KemError {
    #[error("Key wrapping failed: {0}")]
    WrapError(String),

    #[error("Key unwrapping failed: {0}")]
    UnwrapError(String),

    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Key derivation failed")]
    KeyDerivationFailed,

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Trait for key encapsulation mechanisms
pub trait KeyEncapsulation {
    /// Public key type
    type PublicKey;

    /// Private key type
    type PrivateKey;

    /// Wrapped key type (ciphertext)
    type WrappedKey;

    /// Wrap a symmetric key with a public key
    fn wrap(&self, key: &[u8], public_key: &Self::PublicKey) -> Result<Self::WrappedKey, KemError>;

    /// Unwrap a symmetric key with a private key
    fn unwrap(
        &self,
        wrapped: &Self::WrappedKey,
        private_key: &Self::PrivateKey,
    ) -> Result<Vec<u8>, KemError>;
}
