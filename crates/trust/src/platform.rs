//! Key index backed by the platform's KAS key registry
//!
//! Speaks Connect JSON to `policy.kasregistry.KeyAccessServerRegistryService`.
//! Every lookup is a fresh request.

use crate::error::TrustError;
use crate::index::KeyIndex;
use crate::key::{Algorithm, KeyDetails, KeyIdentifier};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const REGISTRY_SERVICE: &str = "policy.kasregistry.KeyAccessServerRegistryService";
const KEY_STATUS_ACTIVE: &str = "KEY_STATUS_ACTIVE";

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Clone, Deserialize)]
pub struct PlatformConfig {
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl PlatformConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProviderConfig {
    #[serde(default)]
    name: String,
    /// base64 of a JSON document
    #[serde(default)]
    config_json: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireKey {
    key_id: String,
    key_algorithm: String,
    #[serde(default)]
    key_status: Option<String>,
    #[serde(default)]
    public_key_ctx: String,
    #[serde(default)]
    private_key_ctx: String,
    #[serde(default)]
    provider_config: Option<WireProviderConfig>,
}

#[derive(Deserialize)]
struct PublicKeyCtx {
    #[serde(rename = "pubKey", default)]
    pub_key: String,
}

#[derive(Deserialize)]
struct GetKeyResponse {
    key: Option<WireKey>,
}

#[derive(Deserialize)]
struct ListKeysResponse {
    #[serde(default)]
    keys: Vec<WireKey>,
}

fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>, TrustError> {
    BASE64
        .decode(value)
        .map_err(|e| TrustError::Transport(format!("registry field {} is not base64: {}", field, e)))
}

impl WireKey {
    fn is_active(&self) -> bool {
        self.key_status.as_deref().map_or(true, |s| s == KEY_STATUS_ACTIVE)
    }

    fn into_details(self) -> Result<KeyDetails, TrustError> {
        let algorithm: Algorithm = self.key_algorithm.parse()?;

        let public_key_pem = if self.public_key_ctx.is_empty() {
            String::new()
        } else {
            let raw = decode_b64("publicKeyCtx", &self.public_key_ctx)?;
            let ctx: PublicKeyCtx = serde_json::from_slice(&raw)
                .map_err(|e| TrustError::Transport(format!("publicKeyCtx: {}", e)))?;
            ctx.pub_key
        };
        let private_key_ctx = if self.private_key_ctx.is_empty() {
            Vec::new()
        } else {
            decode_b64("privateKeyCtx", &self.private_key_ctx)?
        };

        let (mode, provider_config) = match self.provider_config {
            Some(pc) => {
                let config = if pc.config_json.is_empty() {
                    Value::Null
                } else {
                    let raw = decode_b64("providerConfig.configJson", &pc.config_json)?;
                    serde_json::from_slice(&raw)
                        .map_err(|e| TrustError::Transport(format!("configJson: {}", e)))?
                };
                (pc.name, config)
            }
            None => (String::new(), Value::Null),
        };

        Ok(KeyDetails::new(self.key_id, algorithm, public_key_pem)
            .with_legacy(false)
            .with_mode(mode)
            .with_provider_config(provider_config)
            .with_private_key_ctx(private_key_ctx))
    }
}

pub struct PlatformKeyIndexer {
    client: Client,
    config: PlatformConfig,
}

impl PlatformKeyIndexer {
    pub fn new(config: PlatformConfig) -> Result<Self, TrustError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TrustError::config("platform", format!("http client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, TrustError> {
        let url = format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            REGISTRY_SERVICE,
            method
        );
        debug!(method, "key registry call");

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| TrustError::Unavailable(format!("key registry unreachable: {}", e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let code = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("code").and_then(|c| c.as_str()).map(str::to_string))
                .unwrap_or_default();
            return Err(match (status, code.as_str()) {
                (StatusCode::NOT_FOUND, _) | (_, "not_found") => {
                    TrustError::NotFound(format!("{}: {}", method, text))
                }
                (StatusCode::SERVICE_UNAVAILABLE, _) | (_, "unavailable") => {
                    TrustError::Unavailable(format!("{}: {}", method, status))
                }
                _ => {
                    warn!(method, %status, "key registry call failed");
                    TrustError::Transport(format!("{} failed: {} {}", method, status, text))
                }
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| TrustError::Transport(format!("{} response: {}", method, e)))
    }
}

#[async_trait]
impl KeyIndex for PlatformKeyIndexer {
    async fn find_key_by_id(&self, id: &KeyIdentifier) -> Result<KeyDetails, TrustError> {
        let response: GetKeyResponse = self.call("GetKey", json!({ "keyId": id.as_str() })).await?;
        response
            .key
            .ok_or_else(|| TrustError::NotFound(id.to_string()))?
            .into_details()
    }

    /// Registry keys are never legacy, so `include_legacy` has no effect
    async fn find_key_by_algorithm(
        &self,
        algorithm: Algorithm,
        _include_legacy: bool,
    ) -> Result<KeyDetails, TrustError> {
        let response: ListKeysResponse = self.call("ListKeys", json!({})).await?;
        for key in response.keys {
            if !key.is_active() {
                continue;
            }
            match key.key_algorithm.parse::<Algorithm>() {
                Ok(alg) if alg == algorithm => return key.into_details(),
                _ => {}
            }
        }
        Err(TrustError::NotFound(format!("no active key for algorithm {}", algorithm)))
    }

    async fn list_keys(&self) -> Result<Vec<KeyDetails>, TrustError> {
        let response: ListKeysResponse = self.call("ListKeys", json!({})).await?;
        response.keys.into_iter().map(WireKey::into_details).collect()
    }
}
