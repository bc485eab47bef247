//! Policy binding verification and policy decoding

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use opentdf_crypto::BindingEncoding;
use opentdf_protocol::{Policy, RequestBody};
use opentdf_trust::ProtectedKey;
use tracing::warn;

use crate::error::RewrapError;

/// The only binding algorithm accepted when a binding object names one
pub const BINDING_ALGORITHM: &str = "HS256";

/// Check the policy binding against `dek`, then decode the policy
///
/// The HMAC covers the base64 policy string exactly as sent. Every failure is
/// the same generic bad request; the reason is only logged.
pub fn verify_and_parse_policy(
    body: &RequestBody,
    dek: &ProtectedKey,
    encoding: BindingEncoding,
) -> Result<Policy, RewrapError> {
    let binding = &body.key_access.policy_binding;
    if let Some(alg) = binding.alg() {
        if alg != BINDING_ALGORITHM {
            warn!(alg, "unsupported policy binding algorithm");
            return Err(RewrapError::bad_request());
        }
    }

    let expected = encoding.decode(binding.hash()).map_err(|e| {
        warn!(error = %e, %encoding, "invalid policy binding encoding");
        RewrapError::bad_request()
    })?;

    dek.verify_binding(body.policy.as_bytes(), &expected)
        .map_err(|e| {
            warn!(error = %e, "policy hmac mismatch");
            RewrapError::bad_request()
        })?;

    let raw = BASE64.decode(&body.policy).map_err(|e| {
        warn!(error = %e, "unable to decode policy");
        RewrapError::bad_request()
    })?;
    serde_json::from_slice(&raw).map_err(|e| {
        warn!(error = %e, "unable to unmarshal policy");
        RewrapError::bad_request()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;
    use opentdf_crypto::calculate_policy_binding;
    use opentdf_protocol::{KeyAccess, PolicyBinding};

    const DEK: [u8; 32] = [0x5A; 32];

    fn policy_b64() -> String {
        BASE64.encode(
            r#"{"uuid":"3e7a3a3c-9e4e-4b47-8c1b-2f6d6ad1c5a0","body":{"dataAttributes":[{"attribute":"https://example.com/attr/level/value/secret"}],"dissem":[]}}"#,
        )
    }

    fn body(policy: String, binding: PolicyBinding) -> RequestBody {
        RequestBody {
            auth_token: String::new(),
            key_access: KeyAccess {
                policy_binding: binding,
                ..Default::default()
            },
            policy,
            algorithm: String::new(),
            client_public_key: String::new(),
            schema_version: String::new(),
        }
    }

    fn bound(encoding: BindingEncoding) -> RequestBody {
        let policy = policy_b64();
        let hash = calculate_policy_binding(&policy, &DEK, encoding).unwrap();
        body(
            policy,
            PolicyBinding::Object {
                alg: Some("HS256".into()),
                hash,
            },
        )
    }

    #[test]
    fn test_valid_binding_yields_policy() {
        let dek = ProtectedKey::new(DEK.to_vec());
        let policy =
            verify_and_parse_policy(&bound(BindingEncoding::HexBase64), &dek, BindingEncoding::HexBase64)
                .unwrap();
        assert_eq!(
            policy.attribute_fqns(),
            vec!["https://example.com/attr/level/value/secret".to_string()]
        );

        let policy =
            verify_and_parse_policy(&bound(BindingEncoding::Base64), &dek, BindingEncoding::Base64)
                .unwrap();
        assert_eq!(policy.body.data_attributes.len(), 1);
    }

    #[test]
    fn test_legacy_string_binding() {
        let policy = policy_b64();
        let hash = calculate_policy_binding(&policy, &DEK, BindingEncoding::HexBase64).unwrap();
        let request = body(policy, PolicyBinding::Hash(hash));
        let dek = ProtectedKey::new(DEK.to_vec());
        assert!(verify_and_parse_policy(&request, &dek, BindingEncoding::HexBase64).is_ok());
    }

    #[test]
    fn test_wrong_dek_is_bad_request() {
        let dek = ProtectedKey::new(vec![0x5B; 32]);
        let err = verify_and_parse_policy(
            &bound(BindingEncoding::HexBase64),
            &dek,
            BindingEncoding::HexBase64,
        )
        .unwrap_err();
        assert_eq!(err, RewrapError::bad_request());
    }

    #[test]
    fn test_tampered_policy_is_bad_request() {
        let mut request = bound(BindingEncoding::HexBase64);
        request.policy.push('A');
        let dek = ProtectedKey::new(DEK.to_vec());
        let err = verify_and_parse_policy(&request, &dek, BindingEncoding::HexBase64).unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(err.message(), "bad request");
    }

    #[test]
    fn test_encoding_must_match_configuration() {
        let dek = ProtectedKey::new(DEK.to_vec());
        let err =
            verify_and_parse_policy(&bound(BindingEncoding::Base64), &dek, BindingEncoding::HexBase64)
                .unwrap_err();
        assert_eq!(err, RewrapError::bad_request());
    }

    #[test]
    fn test_unsupported_binding_alg() {
        let mut request = bound(BindingEncoding::HexBase64);
        if let PolicyBinding::Object { alg, .. } = &mut request.key_access.policy_binding {
            *alg = Some("HS512".into());
        }
        let dek = ProtectedKey::new(DEK.to_vec());
        assert!(verify_and_parse_policy(&request, &dek, BindingEncoding::HexBase64).is_err());
    }

    #[test]
    fn test_bound_but_malformed_policy() {
        let policy = BASE64.encode("{\"uuid\": 7}");
        let hash = calculate_policy_binding(&policy, &DEK, BindingEncoding::Base64).unwrap();
        let request = body(policy, PolicyBinding::Hash(hash));
        let dek = ProtectedKey::new(DEK.to_vec());
        let err = verify_and_parse_policy(&request, &dek, BindingEncoding::Base64).unwrap_err();
        assert_eq!(err, RewrapError::bad_request());
    }
}
