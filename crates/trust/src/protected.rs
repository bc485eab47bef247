//! Opaque handle over unwrapped key bytes

use crate::encapsulator::Encapsulator;
use crate::error::TrustError;
use opentdf_crypto::{aead, verify_hmac, SymmetricKey};
use std::fmt;
use zeroize::Zeroizing;

/// Decrypted key material scoped to a single rewrap
///
/// The bytes are zeroized on drop and never appear in `Debug` output. The only
/// ways to use them are the bounded operations below; [`ProtectedKey::export`]
/// is the single path that yields bytes.
pub struct ProtectedKey {
    key: SymmetricKey,
}

impl ProtectedKey {
    pub fn new(raw: Vec<u8>) -> Self {
        Self {
            key: SymmetricKey::new(raw),
        }
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// AES-256-GCM decrypt `body` (`ciphertext || tag`) under this key
    pub fn decrypt_aes_gcm(
        &self,
        iv: &[u8],
        body: &[u8],
        tag_size: usize,
    ) -> Result<Vec<u8>, TrustError> {
        Ok(aead::open(self.key.as_slice(), iv, body, tag_size)?)
    }

    /// Check an HMAC-SHA256 policy binding keyed by this key
    pub fn verify_binding(&self, policy: &[u8], binding: &[u8]) -> Result<(), TrustError> {
        if self.key.is_empty() {
            return Err(TrustError::InvalidKey("key data is empty".into()));
        }
        Ok(verify_hmac(self.key.as_slice(), policy, binding)?)
    }

    /// Raw bytes without an encapsulator (same-process use only), otherwise
    /// the encapsulated ciphertext
    pub fn export(
        &self,
        encapsulator: Option<&dyn Encapsulator>,
    ) -> Result<Zeroizing<Vec<u8>>, TrustError> {
        match encapsulator {
            None => Ok(Zeroizing::new(self.key.as_slice().to_vec())),
            Some(encapsulator) => encapsulator
                .encrypt(self.key.as_slice())
                .map(Zeroizing::new)
                .map_err(|e| {
                    tracing::warn!(error = %e, "failed to encrypt key data for export");
                    e
                }),
        }
    }
}

impl fmt::Debug for ProtectedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedKey")
            .field("len", &self.key.len())
            .finish_non_exhaustive()
    }
}
