//! HMAC operations with constant-time verification
//!
//! The policy binding is an HMAC-SHA256 over the base64 policy string, keyed
//! by the DEK. Comparison always goes through `subtle::ConstantTimeEq`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 digest
pub const HMAC_SHA256_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum HmacError {
    #[error("HMAC initialization failed")]
    InitFailed,

    #[error("HMAC verification failed")]
    VerificationFailed,

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Hex decode error: {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("Unknown policy binding encoding: {0}")]
    UnknownEncoding(String),
}

/// Calculate HMAC-SHA256 over data
pub fn calculate_hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, HmacError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| HmacError::InitFailed)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Recompute the HMAC of `data` and compare it with `expected` in constant time
pub fn verify_hmac(key: &[u8], data: &[u8], expected: &[u8]) -> Result<(), HmacError> {
    let calculated = calculate_hmac(key, data)?;
    if calculated.ct_eq(expected).into() {
        Ok(())
    } else {
        Err(HmacError::VerificationFailed)
    }
}

/// Wire encoding of a policy binding hash
///
/// Bindings carry no self-description of their encoding, so the KAS is
/// configured with exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingEncoding {
    /// v1: `base64(hex(hmac))`, as written by TDF3 SDKs
    #[default]
    HexBase64,
    /// v2: `base64(hmac)`
    Base64,
}

impl BindingEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            BindingEncoding::HexBase64 => "hex-base64",
            BindingEncoding::Base64 => "base64",
        }
    }

    /// Encode a raw HMAC digest for the wire
    pub fn encode(self, digest: &[u8]) -> String {
        match self {
            BindingEncoding::HexBase64 => BASE64.encode(hex::encode(digest).as_bytes()),
            BindingEncoding::Base64 => BASE64.encode(digest),
        }
    }

    /// Decode a wire binding back to the raw HMAC digest
    pub fn decode(self, binding: &str) -> Result<Vec<u8>, HmacError> {
        let decoded = BASE64.decode(binding)?;
        match self {
            BindingEncoding::HexBase64 => Ok(hex::decode(decoded)?),
            BindingEncoding::Base64 => Ok(decoded),
        }
    }
}

impl FromStr for BindingEncoding {
    type Err = HmacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hex-base64" | "v1" => Ok(BindingEncoding::HexBase64),
            "base64" | "v2" => Ok(BindingEncoding::Base64),
            other => Err(HmacError::UnknownEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for BindingEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calculate the policy binding for a base64-encoded policy
///
/// The HMAC input is the base64 policy string itself, not the decoded JSON.
pub fn calculate_policy_binding(
    policy_base64: &str,
    key: &[u8],
    encoding: BindingEncoding,
) -> Result<String, HmacError> {
    let digest = calculate_hmac(key, policy_base64.as_bytes())?;
    Ok(encoding.encode(&digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test_key_32_bytes_long_for_hmac!";
    const POLICY: &str = "eyJib2R5Ijp7ImRhdGFBdHRyaWJ1dGVzIjpbXX19";

    #[test]
    fn test_calculate_hmac() {
        let result = calculate_hmac(KEY, b"test data").unwrap();
        assert_eq!(result.len(), HMAC_SHA256_LEN);
    }

    #[test]
    fn test_verify_hmac_detects_single_bit_changes() {
        let mac = calculate_hmac(KEY, POLICY.as_bytes()).unwrap();
        assert!(verify_hmac(KEY, POLICY.as_bytes(), &mac).is_ok());

        let mut first = mac.clone();
        first[0] ^= 1;
        assert!(verify_hmac(KEY, POLICY.as_bytes(), &first).is_err());

        let mut last = mac.clone();
        last[31] ^= 1;
        assert!(verify_hmac(KEY, POLICY.as_bytes(), &last).is_err());

        let mut other_key = KEY.to_vec();
        other_key[5] ^= 0x80;
        assert!(verify_hmac(&other_key, POLICY.as_bytes(), &mac).is_err());

        let mut other_policy = POLICY.as_bytes().to_vec();
        other_policy[3] ^= 0x01;
        assert!(verify_hmac(KEY, &other_policy, &mac).is_err());
    }

    #[test]
    fn test_truncated_digest_rejected() {
        let mac = calculate_hmac(KEY, POLICY.as_bytes()).unwrap();
        assert!(verify_hmac(KEY, POLICY.as_bytes(), &mac[..16]).is_err());
        assert!(verify_hmac(KEY, POLICY.as_bytes(), &[]).is_err());
    }

    #[test]
    fn test_hex_base64_binding_matches_sdk_format() {
        let binding = calculate_policy_binding(POLICY, KEY, BindingEncoding::HexBase64).unwrap();

        // base64 of 64 lowercase hex characters
        let inner = BASE64.decode(&binding).unwrap();
        assert_eq!(inner.len(), 64);
        assert!(inner.iter().all(|b| b.is_ascii_hexdigit()));

        let decoded = BindingEncoding::HexBase64.decode(&binding).unwrap();
        assert_eq!(decoded, calculate_hmac(KEY, POLICY.as_bytes()).unwrap());
    }

    #[test]
    fn test_encodings_are_not_interchangeable() {
        let raw = calculate_policy_binding(POLICY, KEY, BindingEncoding::Base64).unwrap();
        assert_eq!(BASE64.decode(&raw).unwrap().len(), HMAC_SHA256_LEN);

        // A raw digest is not valid hex, so the v1 decoder refuses it
        assert!(matches!(
            BindingEncoding::HexBase64.decode(&raw),
            Err(HmacError::HexError(_))
        ));
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!("hex-base64".parse::<BindingEncoding>().unwrap(), BindingEncoding::HexBase64);
        assert_eq!("v2".parse::<BindingEncoding>().unwrap(), BindingEncoding::Base64);
        assert!("hex".parse::<BindingEncoding>().is_err());
        assert_eq!(BindingEncoding::default().to_string(), "hex-base64");
    }

    #[test]
    fn test_bad_base64_binding() {
        assert!(matches!(
            BindingEncoding::HexBase64.decode("not base64!"),
            Err(HmacError::Base64Error(_))
        ));
    }
}
