//! KAS (Key Access Service) rewrap protocol types
//!
//! The rewrap RPC carries a single signed request token. Its `requestBody`
//! claim is a JSON string decoding to [`RequestBody`].

use serde::{Deserialize, Serialize};

/// Schema version stamped on every rewrap response
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Algorithm identifiers accepted in a request body
pub mod algorithm {
    /// Default when a request omits the algorithm
    pub const RSA_2048: &str = "rsa:2048";
    pub const RSA_4096: &str = "rsa:4096";
    /// Selects the NanoTDF pipeline
    pub const EC_P256: &str = "ec:secp256r1";
    pub const EC_P384: &str = "ec:secp384r1";
    pub const EC_P521: &str = "ec:secp521r1";
}

/// Key access object `type` values
pub mod key_access_type {
    pub const WRAPPED: &str = "wrapped";
    pub const EC_WRAPPED: &str = "ec-wrapped";
    pub const REMOTE: &str = "remote";
}

/// Rewrap RPC request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewrapRequest {
    #[serde(rename = "signedRequestToken")]
    pub signed_request_token: String,
}

/// Rewrap RPC response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewrapResponse {
    #[serde(rename = "entityWrappedKey", with = "base64_bytes")]
    pub entity_wrapped_key: Vec<u8>,
    /// PEM; empty for RSA-wrapped responses
    #[serde(rename = "sessionPublicKey", default)]
    pub session_public_key: String,
    #[serde(rename = "schemaVersion", default)]
    pub schema_version: String,
}

impl RewrapResponse {
    pub fn new(entity_wrapped_key: Vec<u8>, session_public_key: impl Into<String>) -> Self {
        Self {
            entity_wrapped_key,
            session_public_key: session_public_key.into(),
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }
}

/// Body of the `requestBody` claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(rename = "authToken", default)]
    pub auth_token: String,
    #[serde(rename = "keyAccess")]
    pub key_access: KeyAccess,
    /// Base64 policy JSON, exactly as bound at encryption time
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub policy: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    #[serde(rename = "clientPublicKey")]
    pub client_public_key: String,
    #[serde(rename = "schemaVersion", default, skip_serializing_if = "String::is_empty")]
    pub schema_version: String,
}

/// Key access object as sent by the client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyAccess {
    #[serde(rename = "type", default)]
    pub access_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(rename = "wrappedKey", default, with = "base64_bytes")]
    pub wrapped_key: Vec<u8>,
    #[serde(rename = "policyBinding", default)]
    pub policy_binding: PolicyBinding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// NanoTDF header bytes
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<u8>,
    /// PEM ephemeral key for `ec-wrapped` objects
    #[serde(rename = "ephemeralPublicKey", default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_public_key: Option<String>,
    #[serde(rename = "encryptedMetadata", default, skip_serializing_if = "Option::is_none")]
    pub encrypted_metadata: Option<String>,
}

impl KeyAccess {
    pub fn is_ec_wrapped(&self) -> bool {
        self.access_type == key_access_type::EC_WRAPPED
    }
}

/// Policy binding: older clients send the bare hash string, newer ones an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyBinding {
    Hash(String),
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alg: Option<String>,
        hash: String,
    },
}

impl PolicyBinding {
    pub fn hash(&self) -> &str {
        match self {
            PolicyBinding::Hash(hash) => hash,
            PolicyBinding::Object { hash, .. } => hash,
        }
    }

    pub fn alg(&self) -> Option<&str> {
        match self {
            PolicyBinding::Hash(_) => None,
            PolicyBinding::Object { alg, .. } => alg.as_deref(),
        }
    }
}

impl Default for PolicyBinding {
    fn default() -> Self {
        PolicyBinding::Hash(String::new())
    }
}

/// Standard base64 for `Vec<u8>` fields, matching protobuf JSON bytes
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_from_sdk_json() {
        let json = r#"{
            "algorithm": "rsa:2048",
            "clientPublicKey": "-----BEGIN PUBLIC KEY-----\n...",
            "keyAccess": {
                "type": "wrapped",
                "url": "https://kas.example.com",
                "protocol": "kas",
                "wrappedKey": "AQID",
                "policyBinding": {"alg": "HS256", "hash": "abcd"}
            },
            "policy": "eyJ1dWlkIjoiMSJ9"
        }"#;

        let body: RequestBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.key_access.wrapped_key, vec![1, 2, 3]);
        assert_eq!(body.key_access.policy_binding.hash(), "abcd");
        assert_eq!(body.key_access.policy_binding.alg(), Some("HS256"));
        assert!(body.key_access.header.is_empty());
        assert!(!body.key_access.is_ec_wrapped());
        assert!(body.schema_version.is_empty());
    }

    #[test]
    fn test_legacy_string_binding() {
        let json = r#"{"policyBinding": "ZGVhZGJlZWY=", "header": "TDFM"}"#;
        let ka: KeyAccess = serde_json::from_str(json).unwrap();
        assert_eq!(ka.policy_binding, PolicyBinding::Hash("ZGVhZGJlZWY=".into()));
        assert_eq!(ka.policy_binding.alg(), None);
        assert_eq!(ka.header, vec![0x4C, 0x31, 0x4C]);
    }

    #[test]
    fn test_invalid_wrapped_key_base64() {
        let json = r#"{"wrappedKey": "not base64!"}"#;
        assert!(serde_json::from_str::<KeyAccess>(json).is_err());
    }

    #[test]
    fn test_response_wire_names() {
        let response = RewrapResponse::new(vec![0xFF, 0x00], "");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["entityWrappedKey"], "/wA=");
        assert_eq!(value["sessionPublicKey"], "");
        assert_eq!(value["schemaVersion"], SCHEMA_VERSION);
    }
}
