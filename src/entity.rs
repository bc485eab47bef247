//! Caller identity extracted from the access token

use crate::access::Entity;
use crate::context::RequestContext;
use crate::error::RewrapError;
use crate::jwt;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Claims checked for the client id, in increasing precedence
const CLIENT_ID_CLAIMS: [&str; 3] = ["clientId", "cid", "client_id"];

/// Identity of the caller, derived once per request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EntityInfo {
    pub entity_id: String,
    pub client_id: String,
    pub token: String,
}

impl EntityInfo {
    /// The decision entity: the client id when known, else the raw token
    pub fn entity(&self) -> Entity {
        if self.client_id.is_empty() {
            Entity::Jwt(self.token.clone())
        } else {
            Entity::ClientId(self.client_id.clone())
        }
    }
}

impl fmt::Debug for EntityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityInfo")
            .field("entity_id", &self.entity_id)
            .field("client_id", &self.client_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Read the subject and client id from the caller's access token
///
/// The token was authenticated by the transport; only its claims are read.
pub fn entity_info(ctx: &RequestContext) -> Result<EntityInfo, RewrapError> {
    let token = ctx.access_token().ok_or_else(|| {
        warn!("missing access token");
        RewrapError::unauthenticated("missing authorization header")
    })?;

    let claims = jwt::decode_insecure(token).map_err(|e| {
        warn!(error = %e, "unable to decode access token");
        RewrapError::unauthenticated("unable to get token")
    })?;

    let claim = |name: &str| claims.get(name).and_then(Value::as_str).map(str::to_string);

    let mut info = EntityInfo {
        token: token.to_string(),
        ..Default::default()
    };
    if let Some(sub) = claim("sub") {
        info.entity_id = sub;
    }
    for name in CLIENT_ID_CLAIMS {
        if let Some(client_id) = claim(name) {
            info.client_id = client_id;
        }
    }
    if info.client_id.is_empty() {
        debug!("access token carries no client id");
    }
    Ok(info)
}
