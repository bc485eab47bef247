//! TDF3 rewrap: unwrap, bind-check, access-check, rewrap to the client key

use crate::access::can_access;
use crate::context::RequestContext;
use crate::entity::EntityInfo;
use crate::error::RewrapError;
use crate::policy::verify_and_parse_policy;
use crate::provider::{key_error, Provider};
use crate::request::{ClientPublicKey, VerifiedRequest};
use opentdf_protocol::RewrapResponse;
use opentdf_trust::{Algorithm, Encapsulator, RsaEncapsulator};
use tracing::{debug, info, warn};

pub async fn rewrap(
    provider: &Provider,
    ctx: &RequestContext,
    request: &VerifiedRequest,
    entity: &EntityInfo,
) -> Result<RewrapResponse, RewrapError> {
    let body = &request.body;
    let key_access = &body.key_access;
    let settings = provider.settings();

    let ec_wrapped = key_access.is_ec_wrapped();
    if ec_wrapped && !settings.ec_tdf_enabled {
        warn!("ec-wrapped key access object while ec tdf support is disabled");
        return Err(RewrapError::bad_request());
    }

    let algorithm = if ec_wrapped {
        Algorithm::EcP256
    } else {
        body.algorithm
            .parse::<Algorithm>()
            .ok()
            .filter(|alg| alg.is_rsa())
            .unwrap_or(Algorithm::Rsa2048)
    };
    let kid = provider
        .resolve_key(ctx, key_access.kid.as_deref(), algorithm)
        .await?;

    let ephemeral = match (ec_wrapped, key_access.ephemeral_public_key.as_deref()) {
        (true, Some(pem)) => Some(pem.as_bytes()),
        (true, None) => {
            warn!("ec-wrapped key access object without ephemeral public key");
            return Err(RewrapError::bad_request());
        }
        (false, _) => None,
    };

    ctx.checkpoint()?;
    let dek = ctx
        .run(provider.manager().decrypt(&kid, &key_access.wrapped_key, ephemeral))
        .await?
        .map_err(|e| {
            warn!(%kid, error = %e, "failure to decrypt dek");
            key_error(&e)
        })?;

    ctx.checkpoint()?;
    let policy = verify_and_parse_policy(body, &dek, settings.binding_encoding)?;

    can_access(ctx, provider.decider(), &entity.entity(), &policy).await?;

    ctx.checkpoint()?;
    let encapsulator: Box<dyn Encapsulator> = match &request.client_public_key {
        ClientPublicKey::Rsa(key) => Box::new(RsaEncapsulator::new(key.clone())),
        ClientPublicKey::Ec(_) if settings.ec_tdf_enabled => ctx
            .run(provider.manager().generate_ec_session_key(&body.client_public_key))
            .await?
            .map_err(|e| {
                warn!(error = %e, "failed to create ec session key");
                RewrapError::invalid_argument("bad key for rewrap")
            })?,
        ClientPublicKey::Ec(_) => {
            warn!("ec client key for tdf3 while ec tdf support is disabled");
            return Err(RewrapError::invalid_argument("bad key for rewrap"));
        }
    };

    let wrapped = dek.export(Some(encapsulator.as_ref())).map_err(|e| {
        warn!(error = %e, "unable to rewrap key");
        RewrapError::invalid_argument("bad key for rewrap")
    })?;

    debug!(policy = %policy.uuid, %kid, "tdf3 rewrap");
    info!(
        entity_id = %entity.entity_id,
        client_id = %entity.client_id,
        policy = %policy.uuid,
        "rewrap success"
    );
    Ok(RewrapResponse::new(
        wrapped.to_vec(),
        encapsulator.public_key_pem().unwrap_or_default(),
    ))
}
