//! OpenBao / Vault transit backed key manager
//!
//! The key's private half is stored as transit ciphertext in
//! `privateKeyCtx.wrappedKey`; the transit engine unwraps it to a PEM which
//! is then used for a single decrypt.

use crate::encapsulator::Encapsulator;
use crate::error::TrustError;
use crate::index::KeyIndex;
use crate::key::KeyIdentifier;
use crate::manager::KeyManager;
use crate::protected::ProtectedKey;
use crate::standard::Standard;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use opentdf_crypto::EcCurve;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use zeroize::Zeroizing;

pub const TRANSIT_MANAGER_NAME: &str = "openbao";

const DEFAULT_TRANSIT_MOUNT: &str = "transit";

fn default_mount() -> String {
    DEFAULT_TRANSIT_MOUNT.to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

/// Connection settings for the transit engine
#[derive(Clone, Deserialize)]
pub struct TransitConfig {
    pub address: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_mount")]
    pub mount: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TransitConfig {
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: token.into(),
            mount: default_mount(),
            namespace: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}/{}",
            self.address.trim_end_matches('/'),
            self.mount.trim_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl std::fmt::Debug for TransitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitConfig")
            .field("address", &self.address)
            .field("mount", &self.mount)
            .field("namespace", &self.namespace)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TransitKeyCtx {
    #[serde(rename = "wrappedKey", default)]
    wrapped_key: String,
    #[serde(rename = "keyID", default)]
    key_id: String,
}

pub struct TransitKeyManager {
    client: Client,
    config: TransitConfig,
    index: Arc<dyn KeyIndex>,
    standard: Standard,
}

impl TransitKeyManager {
    pub fn new(config: TransitConfig, index: Arc<dyn KeyIndex>) -> Result<Self, TrustError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TrustError::config("transit", format!("http client: {}", e)))?;
        Ok(Self {
            client,
            config,
            index,
            standard: Standard::new(),
        })
    }

    /// `transit/decrypt/{key}`; returns the decoded plaintext
    async fn transit_decrypt(
        &self,
        transit_key: &str,
        ciphertext: &str,
    ) -> Result<Zeroizing<Vec<u8>>, TrustError> {
        let url = self.config.url(&format!("decrypt/{}", transit_key));
        debug!(transit_key, "transit decrypt");

        let mut request = self
            .client
            .post(&url)
            .header("X-Vault-Token", &self.config.token)
            .json(&json!({ "ciphertext": ciphertext }));
        if let Some(namespace) = &self.config.namespace {
            request = request.header("X-Vault-Namespace", namespace);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TrustError::Unavailable(format!("transit request failed: {}", e)))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(%status, transit_key, "transit decrypt rejected");
            return Err(match status {
                StatusCode::SERVICE_UNAVAILABLE => {
                    TrustError::Unavailable(format!("transit decrypt: {}", status))
                }
                _ => TrustError::Transport(format!("transit decrypt failed: {} {}", status, body)),
            });
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| TrustError::Transport(format!("failed to parse transit response: {}", e)))?;
        let plaintext = parsed
            .get("data")
            .and_then(|data| data.get("plaintext"))
            .and_then(|value| value.as_str())
            .ok_or_else(|| TrustError::Transport("decrypt response missing plaintext".into()))?;
        BASE64
            .decode(plaintext)
            .map(Zeroizing::new)
            .map_err(|e| TrustError::Transport(format!("failed to decode plaintext: {}", e)))
    }
}

#[async_trait]
impl KeyManager for TransitKeyManager {
    fn name(&self) -> &str {
        TRANSIT_MANAGER_NAME
    }

    async fn decrypt(
        &self,
        key_id: &KeyIdentifier,
        ciphertext: &[u8],
        ephemeral_public_key: Option<&[u8]>,
    ) -> Result<ProtectedKey, TrustError> {
        let details = self.index.find_key_by_id(key_id).await?;
        let ctx: TransitKeyCtx = serde_json::from_slice(details.private_key_ctx())
            .map_err(|e| TrustError::config("privateKeyCtx", e.to_string()))?;
        if ctx.wrapped_key.is_empty() {
            return Err(TrustError::config("wrappedKey", "missing from private key context"));
        }
        if ctx.key_id.is_empty() {
            return Err(TrustError::config("keyID", "missing from private key context"));
        }

        // wrappedKey is the base64 of the transit ciphertext string ("vault:v1:...")
        let transit_ciphertext = BASE64
            .decode(&ctx.wrapped_key)
            .map_err(|e| TrustError::config("wrappedKey", e.to_string()))?;
        let transit_ciphertext = String::from_utf8(transit_ciphertext)
            .map_err(|_| TrustError::config("wrappedKey", "not UTF-8"))?;

        let pem = self.transit_decrypt(&ctx.key_id, &transit_ciphertext).await?;
        let pem = std::str::from_utf8(&pem)
            .map_err(|_| TrustError::InvalidKey("transit plaintext is not PEM".into()))?;
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
        Err(TrustError::NotImplemented("transit key manager derive_key"))
    }

    async fn generate_ec_session_key(
        &self,
        _ephemeral_public_key: &str,
    ) -> Result<Box<dyn Encapsulator>, TrustError> {
        Err(TrustError::NotImplemented("transit key manager generate_ec_session_key"))
    }
}
