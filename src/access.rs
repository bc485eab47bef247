//! Access decision gate
//!
//! The decision itself belongs to the authorization service; this module only
//! asks and enforces the answer.

use crate::context::RequestContext;
use crate::error::RewrapError;
use async_trait::async_trait;
use opentdf_protocol::Policy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const AUTHORIZATION_SERVICE: &str = "authorization.AuthorizationService";
const ACTION_DECRYPT: &str = "STANDARD_ACTION_DECRYPT";
const DECISION_PERMIT: &str = "DECISION_PERMIT";
const ENTITY_CHAIN_ID: &str = "rewrap-tdf";

/// Who is asking for the key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Entity {
    #[serde(rename = "clientId")]
    ClientId(String),
    /// The caller's verified token, resolved by the authorization service
    #[serde(rename = "jwt")]
    Jwt(String),
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("decision request failed: {0}")]
    Transport(String),

    #[error("decision service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed decision response: {0}")]
    Response(String),
}

/// Decision oracle
#[async_trait]
pub trait AccessDecider: Send + Sync {
    /// `Ok(true)` only when `entity` may decrypt data under `policy`
    async fn decide(&self, entity: &Entity, policy: &Policy) -> Result<bool, AccessError>;
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Clone, Deserialize)]
pub struct AuthorizationConfig {
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl AuthorizationConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for AuthorizationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationConfig")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetDecisionsResponse {
    #[serde(default)]
    decision_responses: Vec<DecisionResponse>,
}

#[derive(Deserialize)]
struct DecisionResponse {
    #[serde(default)]
    decision: String,
}

/// Connect-JSON client for `authorization.AuthorizationService/GetDecisions`
pub struct AuthorizationClient {
    client: Client,
    config: AuthorizationConfig,
}

impl AuthorizationClient {
    pub fn new(config: AuthorizationConfig) -> Result<Self, AccessError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AccessError::Transport(format!("http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl AccessDecider for AuthorizationClient {
    async fn decide(&self, entity: &Entity, policy: &Policy) -> Result<bool, AccessError> {
        let url = format!(
            "{}/{}/GetDecisions",
            self.config.endpoint.trim_end_matches('/'),
            AUTHORIZATION_SERVICE
        );
        let body = json!({
            "decisionRequests": [{
                "actions": [{ "standard": ACTION_DECRYPT }],
                "entityChains": [{ "id": ENTITY_CHAIN_ID, "entities": [entity] }],
                "resourceAttributes": [{
                    "resourceAttributesId": policy.uuid.to_string(),
                    "attributeValueFqns": policy.attribute_fqns(),
                }],
            }],
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AccessError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AccessError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let decisions: GetDecisionsResponse = response
            .json()
            .await
            .map_err(|e| AccessError::Response(e.to_string()))?;

        debug!(count = decisions.decision_responses.len(), "access decisions");
        Ok(!decisions.decision_responses.is_empty()
            && decisions
                .decision_responses
                .iter()
                .all(|d| d.decision == DECISION_PERMIT))
    }
}

/// Ask `decider` and turn anything but an explicit permit into `forbidden`
///
/// Cancellation and deadline errors pass through unchanged.
pub async fn can_access(
    ctx: &RequestContext,
    decider: &dyn AccessDecider,
    entity: &Entity,
    policy: &Policy,
) -> Result<(), RewrapError> {
    match ctx.run(decider.decide(entity, policy)).await? {
        Ok(true) => Ok(()),
        Ok(false) => {
            warn!(policy = %policy.uuid, "access denied");
            Err(RewrapError::forbidden())
        }
        Err(e) => {
            warn!(error = %e, "could not perform access decision");
            Err(RewrapError::forbidden())
        }
    }
}
