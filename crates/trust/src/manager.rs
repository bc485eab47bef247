//! Key manager trait and the mode-routing manager

use crate::encapsulator::Encapsulator;
use crate::error::TrustError;
use crate::index::KeyIndex;
use crate::key::KeyIdentifier;
use crate::protected::ProtectedKey;
use async_trait::async_trait;
use opentdf_crypto::EcCurve;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Uses key material without handing raw private keys to the caller
///
/// Implementations must be safe to call concurrently and must not retain
/// decrypted bytes beyond a single call. A capability a backend does not
/// offer returns [`TrustError::NotImplemented`].
#[async_trait]
pub trait KeyManager: Send + Sync {
    /// Matched against [`crate::KeyDetails::mode`]
    fn name(&self) -> &str;

    /// Unwrap `ciphertext` with key `key_id`; EC keys need the sender's ephemeral key
    async fn decrypt(
        &self,
        key_id: &KeyIdentifier,
        ciphertext: &[u8],
        ephemeral_public_key: Option<&[u8]>,
    ) -> Result<ProtectedKey, TrustError>;

    /// ECDH with `ephemeral_public_key` followed by HKDF-SHA256 under `salt`
    async fn derive_key(
        &self,
        key_id: &KeyIdentifier,
        ephemeral_public_key: &[u8],
        curve: EcCurve,
        salt: &[u8],
    ) -> Result<ProtectedKey, TrustError>;

    /// Encapsulator for a client-provided EC public key (PEM)
    async fn generate_ec_session_key(
        &self,
        ephemeral_public_key: &str,
    ) -> Result<Box<dyn Encapsulator>, TrustError>;

    async fn close(&self) {}
}

/// Routes each call to the manager named by the key's mode
pub struct DelegatingKeyManager {
    index: Arc<dyn KeyIndex>,
    managers: HashMap<String, Arc<dyn KeyManager>>,
    default: Arc<dyn KeyManager>,
}

impl DelegatingKeyManager {
    pub fn new(index: Arc<dyn KeyIndex>, default: Arc<dyn KeyManager>) -> Self {
        Self {
            index,
            managers: HashMap::new(),
            default,
        }
    }

    pub fn with_manager(mut self, manager: Arc<dyn KeyManager>) -> Self {
        self.managers.insert(manager.name().to_string(), manager);
        self
    }

    async fn manager_for(&self, key_id: &KeyIdentifier) -> Result<&Arc<dyn KeyManager>, TrustError> {
        let details = self.index.find_key_by_id(key_id).await?;
        match self.managers.get(details.mode()) {
            Some(manager) => Ok(manager),
            None => {
                debug!(
                    kid = %key_id,
                    mode = details.mode(),
                    fallback = self.default.name(),
                    "no key manager for mode, using default"
                );
                Ok(&self.default)
            }
        }
    }
}

#[async_trait]
impl KeyManager for DelegatingKeyManager {
    fn name(&self) -> &str {
        "delegating"
    }

    async fn decrypt(
        &self,
        key_id: &KeyIdentifier,
        ciphertext: &[u8],
        ephemeral_public_key: Option<&[u8]>,
    ) -> Result<ProtectedKey, TrustError> {
        self.manager_for(key_id)
            .await?
            .decrypt(key_id, ciphertext, ephemeral_public_key)
            .await
    }

    async fn derive_key(
        &self,
        key_id: &KeyIdentifier,
        ephemeral_public_key: &[u8],
        curve: EcCurve,
        salt: &[u8],
    ) -> Result<ProtectedKey, TrustError> {
        self.manager_for(key_id)
            .await?
            .derive_key(key_id, ephemeral_public_key, curve, salt)
            .await
    }

    async fn generate_ec_session_key(
        &self,
        ephemeral_public_key: &str,
    ) -> Result<Box<dyn Encapsulator>, TrustError> {
        self.default.generate_ec_session_key(ephemeral_public_key).await
    }

    async fn close(&self) {
        for manager in self.managers.values() {
            manager.close().await;
        }
        self.default.close().await;
    }
}
