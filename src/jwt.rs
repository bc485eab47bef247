//! Compact JWS verification for DPoP-bound request tokens
//!
//! Only what the rewrap path needs: ES256 with a P-256 key and RS256 with an
//! RSA key, plus `exp` / `nbf` validation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use p256::ecdsa::signature::Verifier as _;
use rsa::signature::Verifier as _;
use p256::pkcs8::DecodePublicKey;
use rsa::{BigUint, RsaPublicKey};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::Sha256;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("token algorithm {0} does not match key type")]
    KeyMismatch(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Public half of the caller's DPoP key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DpopKey {
    Ec(p256::PublicKey),
    Rsa(RsaPublicKey),
}

impl DpopKey {
    /// Parse a public JWK (`kty` `EC` on P-256 or `RSA`)
    pub fn from_jwk(jwk: &str) -> Result<Self, JwtError> {
        let value: Value =
            serde_json::from_str(jwk).map_err(|e| JwtError::InvalidKey(e.to_string()))?;
        match value.get("kty").and_then(Value::as_str) {
            Some("EC") => p256::PublicKey::from_jwk_str(jwk)
                .map(DpopKey::Ec)
                .map_err(|e| JwtError::InvalidKey(e.to_string())),
            Some("RSA") => {
                let component = |name: &str| -> Result<BigUint, JwtError> {
                    let encoded = value
                        .get(name)
                        .and_then(Value::as_str)
                        .ok_or_else(|| JwtError::InvalidKey(format!("missing {}", name)))?;
                    let bytes = URL_SAFE_NO_PAD
                        .decode(encoded)
                        .map_err(|e| JwtError::InvalidKey(e.to_string()))?;
                    Ok(BigUint::from_bytes_be(&bytes))
                };
                RsaPublicKey::new(component("n")?, component("e")?)
                    .map(DpopKey::Rsa)
                    .map_err(|e| JwtError::InvalidKey(e.to_string()))
            }
            other => Err(JwtError::InvalidKey(format!("unsupported kty {:?}", other))),
        }
    }

    /// Parse an SPKI PEM public key
    pub fn from_public_key_pem(pem: &str) -> Result<Self, JwtError> {
        if let Ok(key) = p256::PublicKey::from_public_key_pem(pem) {
            return Ok(DpopKey::Ec(key));
        }
        RsaPublicKey::from_public_key_pem(pem)
            .map(DpopKey::Rsa)
            .map_err(|e| JwtError::InvalidKey(e.to_string()))
    }

    fn verify(&self, alg: &str, message: &[u8], signature: &[u8]) -> Result<(), JwtError> {
        match (alg, self) {
            ("ES256", DpopKey::Ec(key)) => {
                let signature = p256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| JwtError::InvalidSignature)?;
                p256::ecdsa::VerifyingKey::from(key)
                    .verify(message, &signature)
                    .map_err(|_| JwtError::InvalidSignature)
            }
            ("RS256", DpopKey::Rsa(key)) => {
                let signature = rsa::pkcs1v15::Signature::try_from(signature)
                    .map_err(|_| JwtError::InvalidSignature)?;
                rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone())
                    .verify(message, &signature)
                    .map_err(|_| JwtError::InvalidSignature)
            }
            ("ES256" | "RS256", _) => Err(JwtError::KeyMismatch(alg.to_string())),
            _ => Err(JwtError::UnsupportedAlgorithm(alg.to_string())),
        }
    }
}

#[derive(Deserialize)]
struct JoseHeader {
    alg: String,
}

/// Claims of a token whose signature has been checked
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    alg: String,
    claims: Map<String, Value>,
}

impl VerifiedToken {
    pub fn algorithm(&self) -> &str {
        &self.alg
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}

fn split(token: &str) -> Result<(&str, &str, &str), JwtError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => Ok((h, p, s)),
        _ => Err(JwtError::Malformed("expected three segments".into())),
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, JwtError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| JwtError::Malformed(e.to_string()))
}

fn decode_claims(segment: &str) -> Result<Map<String, Value>, JwtError> {
    serde_json::from_slice(&decode_segment(segment)?).map_err(|e| JwtError::Malformed(e.to_string()))
}

/// Verify signature and time claims against `key`
pub fn verify(token: &str, key: &DpopKey) -> Result<VerifiedToken, JwtError> {
    let (header, payload, signature) = split(token)?;
    let jose: JoseHeader = serde_json::from_slice(&decode_segment(header)?)
        .map_err(|e| JwtError::Malformed(e.to_string()))?;

    let signing_input = &token[..header.len() + 1 + payload.len()];
    key.verify(&jose.alg, signing_input.as_bytes(), &decode_segment(signature)?)?;

    let claims = decode_claims(payload)?;
    validate_time(&claims, chrono::Utc::now().timestamp())?;
    Ok(VerifiedToken {
        alg: jose.alg,
        claims,
    })
}

/// Read claims without checking the signature
///
/// For access tokens already authenticated upstream.
pub fn decode_insecure(token: &str) -> Result<Map<String, Value>, JwtError> {
    let (_, payload, _) = split(token)?;
    decode_claims(payload)
}

fn validate_time(claims: &Map<String, Value>, now: i64) -> Result<(), JwtError> {
    if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
        if now >= exp {
            return Err(JwtError::Expired);
        }
    }
    if let Some(nbf) = claims.get("nbf").and_then(Value::as_i64) {
        if now < nbf {
            return Err(JwtError::NotYetValid);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::{signature::Signer, SigningKey};
    use rand::rngs::OsRng;
    use serde_json::json;

    fn sign_es256(claims: &Value, key: &SigningKey) -> String {
        let header = URL_SAFE_NO_PAD.encode(json!({"alg": "ES256", "typ": "JWT"}).to_string());
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let input = format!("{}.{}", header, payload);
        let signature: p256::ecdsa::Signature = key.sign(input.as_bytes());
        format!("{}.{}", input, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }

    fn ec_key() -> (SigningKey, DpopKey) {
        let signing = SigningKey::random(&mut OsRng);
        let public = p256::PublicKey::from(signing.verifying_key());
        (signing, DpopKey::Ec(public))
    }

    #[test]
    fn test_es256_roundtrip() {
        let (signing, dpop) = ec_key();
        let token = sign_es256(&json!({"requestBody": "{}"}), &signing);
        let verified = verify(&token, &dpop).unwrap();
        assert_eq!(verified.algorithm(), "ES256");
        assert_eq!(verified.claim("requestBody"), Some(&json!("{}")));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let (signing, _) = ec_key();
        let (_, other) = ec_key();
        let token = sign_es256(&json!({"a": 1}), &signing);
        assert_eq!(verify(&token, &other).unwrap_err(), JwtError::InvalidSignature);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let (signing, dpop) = ec_key();
        let token = sign_es256(&json!({"a": 1}), &signing);
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(json!({"a": 2}).to_string()),
            parts[2]
        );
        assert_eq!(verify(&forged, &dpop).unwrap_err(), JwtError::InvalidSignature);
    }

    #[test]
    fn test_expired_token() {
        let (signing, dpop) = ec_key();
        let token = sign_es256(&json!({"exp": 1_000}), &signing);
        assert_eq!(verify(&token, &dpop).unwrap_err(), JwtError::Expired);

        let future = chrono::Utc::now().timestamp() + 3600;
        let token = sign_es256(&json!({"nbf": future}), &signing);
        assert_eq!(verify(&token, &dpop).unwrap_err(), JwtError::NotYetValid);
    }

    #[test]
    fn test_algorithm_must_match_key() {
        let (signing, _) = ec_key();
        let rsa = rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let dpop = DpopKey::Rsa(RsaPublicKey::from(&rsa));
        let token = sign_es256(&json!({}), &signing);
        assert_eq!(verify(&token, &dpop).unwrap_err(), JwtError::KeyMismatch("ES256".into()));

        let none = format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode("{}")
        );
        assert_eq!(
            verify(&none, &dpop).unwrap_err(),
            JwtError::UnsupportedAlgorithm("none".into())
        );
    }

    #[test]
    fn test_dpop_key_from_jwk() {
        let (signing, dpop) = ec_key();
        let jwk = p256::PublicKey::from(signing.verifying_key()).to_jwk_string();
        assert_eq!(DpopKey::from_jwk(&jwk).unwrap(), dpop);
        assert!(DpopKey::from_jwk(r#"{"kty":"oct","k":"AA"}"#).is_err());
    }

    #[test]
    fn test_decode_insecure() {
        let (signing, _) = ec_key();
        let token = sign_es256(&json!({"sub": "alice", "cid": "opentdf"}), &signing);
        let claims = decode_insecure(&token).unwrap();
        assert_eq!(claims["sub"], "alice");
        assert!(decode_insecure("not-a-token").is_err());
    }
}
