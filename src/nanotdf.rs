//! NanoTDF rewrap
//!
//! The DEK is derived by ECDH between the KAS key and the header's ephemeral
//! key, then sealed for the client under a fresh session key:
//!
//! ```text
//! dek      = HKDF(ECDH(kas, header ephemeral), SHA256("L1" || version))
//! session  = HKDF(ECDH(fresh kas ephemeral, client), same salt)
//! response = iv(12) || AES-GCM(session, dek) || tag(12), fresh ephemeral PEM
//! ```

use crate::access::can_access;
use crate::config::NanoAccess;
use crate::context::RequestContext;
use crate::entity::EntityInfo;
use crate::error::RewrapError;
use crate::provider::{key_error, Provider};
use crate::request::{ClientPublicKey, VerifiedRequest};
use opentdf_crypto::{nanotdf_salt, EcCurve, NanoTdfVersion};
use opentdf_protocol::nanotdf::{EccMode, PolicyBody};
use opentdf_protocol::{NanoTdfHeader, Policy, RewrapResponse};
use opentdf_trust::{Algorithm, EcSessionEncapsulator, ProtectedKey};
use tracing::{debug, info, warn};

/// GCM tag size for the session-wrapped DEK
pub const SESSION_TAG_SIZE: usize = 12;

/// Uncompressed P-256 point: `0x04 || X(32) || Y(32)`
const P256_UNCOMPRESSED_LEN: usize = 65;

pub async fn rewrap(
    provider: &Provider,
    ctx: &RequestContext,
    request: &VerifiedRequest,
    entity: &EntityInfo,
) -> Result<RewrapResponse, RewrapError> {
    let key_access = &request.body.key_access;

    let header = NanoTdfHeader::parse(&key_access.header).map_err(|e| {
        warn!(error = %e, "failed to parse nanotdf header");
        RewrapError::internal()
    })?;
    if header.ecc_and_binding_mode.ecc_mode != EccMode::Secp256r1 {
        warn!(curve = ?header.ecc_and_binding_mode.ecc_mode, "unsupported nanotdf curve");
        return Err(RewrapError::internal());
    }
    let version = NanoTdfVersion::from_byte(header.version).ok_or_else(|| {
        warn!(version = header.version, "unsupported nanotdf version");
        RewrapError::internal()
    })?;
    let salt = nanotdf_salt(version);

    let client = match &request.client_public_key {
        ClientPublicKey::Ec(key) => key,
        ClientPublicKey::Rsa(_) => {
            warn!("nanotdf rewrap requires an ec client key");
            return Err(RewrapError::bad_request());
        }
    };
    match request.client_public_key.ec_uncompressed_point() {
        Some(point) if point.len() == P256_UNCOMPRESSED_LEN && point[0] == 0x04 => {}
        _ => {
            warn!("client public key is not an uncompressed p-256 point");
            return Err(RewrapError::bad_request());
        }
    }

    let header_kid = header
        .kas
        .identifier
        .as_deref()
        .map(|id| String::from_utf8_lossy(id).trim_end_matches('\0').to_string());
    let kid = provider
        .resolve_key(ctx, header_kid.as_deref(), Algorithm::EcP256)
        .await?;

    ctx.checkpoint()?;
    let dek = ctx
        .run(provider.manager().derive_key(
            &kid,
            &header.ephemeral_public_key,
            EcCurve::P256,
            &salt,
        ))
        .await?
        .map_err(|e| {
            warn!(%kid, error = %e, "failed to derive nanotdf key");
            if e.is_backend_failure() {
                key_error(&e)
            } else {
                RewrapError::internal()
            }
        })?;

    if provider.settings().nano_access == NanoAccess::EmbeddedPolicy {
        let policy = embedded_policy(&header, &dek)?;
        can_access(ctx, provider.decider(), &entity.entity(), &policy).await?;
    }

    ctx.checkpoint()?;
    let encapsulator = EcSessionEncapsulator::new(client, &salt, SESSION_TAG_SIZE).map_err(|e| {
        warn!(error = %e, "failed to create session key");
        RewrapError::internal()
    })?;
    let wrapped = dek.export(Some(&encapsulator)).map_err(|e| {
        warn!(error = %e, "failed to wrap nanotdf key");
        RewrapError::internal()
    })?;

    debug!(%kid, version = header.version, "nanotdf rewrap");
    info!(
        entity_id = %entity.entity_id,
        client_id = %entity.client_id,
        "rewrap success"
    );
    Ok(RewrapResponse::new(
        wrapped.to_vec(),
        encapsulator.session_public_key_pem(),
    ))
}

/// Decode the header's embedded policy with the derived DEK
///
/// Encrypted policies use the DEK with an all-zero IV. Remote policies cannot
/// be checked here and are denied.
fn embedded_policy(header: &NanoTdfHeader, dek: &ProtectedKey) -> Result<Policy, RewrapError> {
    let plaintext = match &header.policy.body {
        PolicyBody::EmbeddedPlaintext(content) => content.clone(),
        PolicyBody::EmbeddedEncrypted(content) => {
            let tag_size = header.symmetric_and_payload_config.symmetric_cipher.tag_size();
            dek.decrypt_aes_gcm(&[0u8; 12], content, tag_size)
                .map_err(|e| {
                    warn!(error = %e, "failed to decrypt embedded policy");
                    RewrapError::bad_request()
                })?
        }
        other => {
            warn!(policy_type = ?other.policy_type(), "policy cannot be evaluated by the kas");
            return Err(RewrapError::forbidden());
        }
    };
    serde_json::from_slice(&plaintext).map_err(|e| {
        warn!(error = %e, "unable to unmarshal embedded policy");
        RewrapError::bad_request()
    })
}
