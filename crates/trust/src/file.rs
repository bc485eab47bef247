//! Keys whose private half is wrapped under a key-encryption key on disk

use crate::encapsulator::Encapsulator;
use crate::error::TrustError;
use crate::index::KeyIndex;
use crate::key::{KeyDetails, KeyIdentifier};
use crate::manager::KeyManager;
use crate::protected::ProtectedKey;
use crate::standard::Standard;
use async_trait::async_trait;
use opentdf_crypto::EcCurve;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

pub const FILE_MANAGER_NAME: &str = "opentdf.io/file";

#[derive(Deserialize)]
struct FilePrivateKeyCtx {
    #[serde(rename = "wrappedKey", default)]
    wrapped_key: String,
}

/// Reads the KEK named by `providerConfig.filepath`, unwraps the
/// `privateKeyCtx.wrappedKey` PEM with it, then decrypts
pub struct FileKeyManager {
    index: Arc<dyn KeyIndex>,
    standard: Standard,
}

impl FileKeyManager {
    pub fn new(index: Arc<dyn KeyIndex>) -> Self {
        Self {
            index,
            standard: Standard::new(),
        }
    }

    async fn read_kek(details: &KeyDetails) -> Result<Zeroizing<Vec<u8>>, TrustError> {
        let path = details
            .provider_config()
            .get("filepath")
            .and_then(|v| v.as_str())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| TrustError::config("filepath", "missing from provider config"))?;
        debug!(kid = %details.id(), path, "reading key encryption key");
        tokio::fs::read(path)
            .await
            .map(Zeroizing::new)
            .map_err(|e| TrustError::config("filepath", format!("{}: {}", path, e)))
    }
}

pub(crate) fn wrapped_key_from_ctx(ctx: &[u8]) -> Result<String, TrustError> {
    let parsed: FilePrivateKeyCtx = serde_json::from_slice(ctx)
        .map_err(|e| TrustError::config("privateKeyCtx", e.to_string()))?;
    if parsed.wrapped_key.is_empty() {
        return Err(TrustError::config("wrappedKey", "missing from private key context"));
    }
    Ok(parsed.wrapped_key)
}

#[async_trait]
impl KeyManager for FileKeyManager {
    fn name(&self) -> &str {
        FILE_MANAGER_NAME
    }

    async fn decrypt(
        &self,
        key_id: &KeyIdentifier,
        ciphertext: &[u8],
        ephemeral_public_key: Option<&[u8]>,
    ) -> Result<ProtectedKey, TrustError> {
        let details = self.index.find_key_by_id(key_id).await?;
        let kek = Self::read_kek(&details).await?;
        let wrapped = wrapped_key_from_ctx(details.private_key_ctx())?;

        let pem = self.standard.decrypt_symmetric(&kek, &wrapped)?;
        let pem = std::str::from_utf8(&pem)
            .map_err(|_| TrustError::InvalidKey("unwrapped private key is not PEM".into()))?;
        self.standard
            .decrypt_asymmetric(details.algorithm(), pem, ciphertext, ephemeral_public_key)
    }

    async fn derive_key(
        &self,
        _key_id: &KeyIdentifier,
        _ephemeral_public_key: &[u8],
        _curve: EcCurve,
        _salt: &[u8],
    ) -> Result<ProtectedKey, TrustError> {
        Err(TrustError::NotImplemented("file key manager derive_key"))
    }

    async fn generate_ec_session_key(
        &self,
        _ephemeral_public_key: &str,
    ) -> Result<Box<dyn Encapsulator>, TrustError> {
        Err(TrustError::NotImplemented("file key manager generate_ec_session_key"))
    }
}
