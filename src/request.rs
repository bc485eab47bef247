//! Signed request token verification

use crate::context::RequestContext;
use crate::error::RewrapError;
use crate::jwt::{self, VerifiedToken};
use opentdf_protocol::{RequestBody, RewrapRequest};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use pkcs8::der::Decode;
use pkcs8::spki::SubjectPublicKeyInfoRef;
use pkcs8::ObjectIdentifier;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use tracing::{debug, error, warn};

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// The client's parsed public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPublicKey {
    Rsa(RsaPublicKey),
    Ec(p256::PublicKey),
}

impl ClientPublicKey {
    /// Parse a PEM encoded SPKI (or PKCS#1 RSA) public key
    pub fn from_pem(pem_text: &str) -> Result<Self, RewrapError> {
        let block = pem::parse(pem_text).map_err(|e| {
            warn!(error = %e, "missing clientPublicKey");
            RewrapError::invalid_argument("clientPublicKey failure")
        })?;

        if block.tag() == "RSA PUBLIC KEY" {
            return RsaPublicKey::from_pkcs1_der(block.contents())
                .map(ClientPublicKey::Rsa)
                .map_err(|e| {
                    warn!(error = %e, "failure to parse clientPublicKey");
                    RewrapError::invalid_argument("clientPublicKey parse failure")
                });
        }

        let spki = SubjectPublicKeyInfoRef::from_der(block.contents()).map_err(|e| {
            warn!(error = %e, "failure to parse clientPublicKey");
            RewrapError::invalid_argument("clientPublicKey parse failure")
        })?;

        let unsupported = |reason: &str| {
            warn!(oid = %spki.algorithm.oid, reason, "clientPublicKey not a supported key");
            RewrapError::invalid_argument("clientPublicKey unsupported type")
        };
        match spki.algorithm.oid {
            RSA_ENCRYPTION => RsaPublicKey::from_public_key_der(block.contents())
                .map(ClientPublicKey::Rsa)
                .map_err(|e| {
                    warn!(error = %e, "failure to parse clientPublicKey");
                    RewrapError::invalid_argument("clientPublicKey parse failure")
                }),
            EC_PUBLIC_KEY => p256::PublicKey::from_public_key_der(block.contents())
                .map(ClientPublicKey::Ec)
                .map_err(|_| unsupported("only P-256 EC keys are supported")),
            _ => Err(unsupported("neither RSA nor EC")),
        }
    }

    pub fn is_ec(&self) -> bool {
        matches!(self, ClientPublicKey::Ec(_))
    }

    /// Uncompressed SEC1 point (`0x04 || X || Y`) for EC keys
    pub fn ec_uncompressed_point(&self) -> Option<Vec<u8>> {
        match self {
            ClientPublicKey::Ec(key) => Some(key.to_encoded_point(false).as_bytes().to_vec()),
            ClientPublicKey::Rsa(_) => None,
        }
    }
}

/// A request whose token, body and client key have all been checked
#[derive(Debug, Clone)]
pub struct VerifiedRequest {
    pub body: RequestBody,
    pub client_public_key: ClientPublicKey,
    pub token: VerifiedToken,
}

/// Verify the DPoP-signed request token and extract its request body
pub fn verify_signed_request_token(
    ctx: &RequestContext,
    request: &RewrapRequest,
) -> Result<VerifiedRequest, RewrapError> {
    let dpop_key = ctx.dpop_key().ok_or_else(|| {
        error!("missing dpop public key");
        RewrapError::unauthenticated("dpop public key missing")
    })?;

    let token = jwt::verify(&request.signed_request_token, dpop_key).map_err(|e| {
        warn!(error = %e, "unable to verify request token");
        RewrapError::unauthenticated("unable to verify request token")
    })?;

    let raw_body = match token.claim("requestBody") {
        Some(value) => value.as_str().ok_or_else(|| {
            warn!("request body claim is not a string");
            RewrapError::invalid_argument("invalid request body")
        })?,
        None => {
            warn!("missing request body");
            return Err(RewrapError::invalid_argument("missing request body"));
        }
    };

    let body: RequestBody = serde_json::from_str(raw_body).map_err(|e| {
        warn!(error = %e, "invalid request body");
        RewrapError::invalid_argument("invalid request body")
    })?;

    debug!(algorithm = %body.algorithm, "extract public key");
    let client_public_key = ClientPublicKey::from_pem(&body.client_public_key)?;

    Ok(VerifiedRequest {
        body,
        client_public_key,
        token,
    })
}
