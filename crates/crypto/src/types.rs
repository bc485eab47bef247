//! Zeroizing cryptographic key types
//!
//! Key material handled by the KAS is wrapped in these types so that it is
//! cleared from memory when dropped and never printed by `Debug`.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key (32 bytes) that zeroizes on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AesKey(pub(crate) [u8; 32]);

impl AesKey {
    /// Create a new AES key from a 32-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != 32 {
            return Err(KeyError::InvalidLength {
                expected: 32,
                got: bytes.len(),
            });
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        Ok(AesKey(key))
    }

    /// Get a reference to the key bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey([REDACTED])")
    }
}

/// Variable-length secret bytes that zeroize on drop
///
/// Used for unwrapped DEKs (16, 24 or 32 bytes depending on the producer)
/// and for decrypted private key material.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey(Vec<u8>);

impl SymmetricKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        SymmetricKey(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        SymmetricKey(bytes.to_vec())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<AesKey> for SymmetricKey {
    fn from(key: AesKey) -> Self {
        SymmetricKey(key.as_slice().to_vec())
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("len", &self.0.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Key-related errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
}
