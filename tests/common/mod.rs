//! Common test utilities for rewrap integration tests
//!
//! Key generation, request signing, policy binding and NanoTDF header
//! construction shared across the integration test files.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD},
    Engine as _,
};
use opentdf_access::{
    AccessDecider, AccessError, DpopKey, Entity, KasSettings, Provider, RequestContext,
    RewrapRequest,
};
use opentdf_crypto::{
    calculate_policy_binding, derive_shared_key, nanotdf_salt, BindingEncoding, KeyEncapsulation,
    NanoTdfVersion, RsaOaepKem,
};
use opentdf_protocol::nanotdf::{
    EccAndBindingMode, EccMode, Header, PayloadSignatureMode, Policy as NanoPolicy, Protocol,
    ResourceLocator, SymmetricAndPayloadConfig, SymmetricCipher,
};
use opentdf_protocol::Policy;
use opentdf_trust::{EcKeyPair, InProcessKeys, KeyPair, RsaKeyPair};
use p256::ecdsa::{signature::Signer, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const KAS_URL: &str = "https://kas.example.com";
pub const RSA_KID: &str = "r1";
pub const EC_KID: &str = "e1";
pub const SECRET_FQN: &str = "https://example.com/attr/level/value/secret";

pub const POLICY_JSON: &str = r#"{"uuid":"3e7a3a3c-9e4e-4b47-8c1b-2f6d6ad1c5a0","body":{"dataAttributes":[{"attribute":"https://example.com/attr/level/value/secret"}],"dissem":[]}}"#;

/// Decision oracle with a fixed answer that counts how often it was asked
pub struct FixedDecision {
    permit: bool,
    calls: AtomicUsize,
}

impl FixedDecision {
    pub fn permit() -> Arc<Self> {
        Arc::new(Self {
            permit: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn deny() -> Arc<Self> {
        Arc::new(Self {
            permit: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessDecider for FixedDecision {
    async fn decide(&self, _entity: &Entity, policy: &Policy) -> Result<bool, AccessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(policy.attribute_fqns(), vec![SECRET_FQN.to_string()]);
        Ok(self.permit)
    }
}

/// KAS key material for one test
pub struct KasKeys {
    pub rsa: RsaKeyPair,
    pub ec: EcKeyPair,
}

impl KasKeys {
    pub fn generate() -> Self {
        Self {
            rsa: RsaKeyPair::generate(2048).unwrap(),
            ec: EcKeyPair::generate().unwrap(),
        }
    }

    pub fn in_process(&self) -> InProcessKeys {
        let mut keys = InProcessKeys::new()
            .with_key(RSA_KID, KeyPair::Rsa(self.rsa.clone()))
            .unwrap()
            .with_key(EC_KID, KeyPair::Ec(self.ec.clone()))
            .unwrap();
        keys.set_default(RSA_KID).unwrap();
        keys.set_default(EC_KID).unwrap();
        keys
    }
}

pub fn rsa_private_pem(key: &RsaPrivateKey) -> String {
    use rsa::pkcs8::EncodePrivateKey;
    key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
}

pub fn provider(keys: &KasKeys, decider: Arc<dyn AccessDecider>, settings: KasSettings) -> Provider {
    let keys = Arc::new(keys.in_process());
    Provider::new(keys.clone(), keys, decider).with_settings(settings)
}

pub fn settings() -> KasSettings {
    KasSettings {
        uri: KAS_URL.to_string(),
        ..Default::default()
    }
}

/// Client RSA keypair and its SPKI PEM
pub fn client_rsa() -> (RsaPrivateKey, String) {
    let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let pem = RsaPublicKey::from(&private)
        .to_public_key_pem(LineEnding::LF)
        .unwrap();
    (private, pem)
}

/// Client EC keypair and its SPKI PEM
pub fn client_ec() -> (p256::SecretKey, String) {
    let private = p256::SecretKey::random(&mut OsRng);
    let pem = private.public_key().to_public_key_pem(LineEnding::LF).unwrap();
    (private, pem)
}

/// DPoP signing key and the context a transport would build for it
pub fn dpop_context(access_claims: Value) -> (SigningKey, RequestContext) {
    let signing = SigningKey::random(&mut OsRng);
    let ctx = RequestContext::new()
        .with_dpop_key(DpopKey::Ec(p256::PublicKey::from(signing.verifying_key())))
        .with_access_token(unsigned_token(&access_claims));
    (signing, ctx)
}

pub fn unsigned_token(claims: &Value) -> String {
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// ES256 request token carrying `body` as its `requestBody` claim
pub fn signed_request(body: &Value, key: &SigningKey) -> RewrapRequest {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "ES256", "typ": "JWT"}).to_string());
    let claims = json!({
        "requestBody": body.to_string(),
        "iat": chrono::Utc::now().timestamp(),
        "exp": chrono::Utc::now().timestamp() + 60,
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let input = format!("{}.{}", header, payload);
    let signature: p256::ecdsa::Signature = key.sign(input.as_bytes());
    RewrapRequest {
        signed_request_token: format!("{}.{}", input, URL_SAFE_NO_PAD.encode(signature.to_bytes())),
    }
}

pub fn policy_b64() -> String {
    BASE64.encode(POLICY_JSON)
}

/// TDF3 request body: `dek` wrapped to the KAS RSA key with a valid binding
pub fn tdf3_body(kas: &RsaKeyPair, dek: &[u8], client_pem: &str) -> Value {
    let wrapped = RsaOaepKem::default().wrap(dek, &kas.public_key()).unwrap();
    let policy = policy_b64();
    let binding = calculate_policy_binding(&policy, dek, BindingEncoding::HexBase64).unwrap();
    json!({
        "algorithm": "rsa:2048",
        "clientPublicKey": client_pem,
        "keyAccess": {
            "type": "wrapped",
            "url": KAS_URL,
            "protocol": "kas",
            "kid": RSA_KID,
            "wrappedKey": BASE64.encode(wrapped),
            "policyBinding": {"alg": "HS256", "hash": binding},
        },
        "policy": policy,
    })
}

/// NanoTDF header for `kas_public` plus the DEK the sender derived
pub fn nano_header(kas_public: &p256::PublicKey, policy: NanoPolicy) -> (Vec<u8>, Vec<u8>) {
    let ephemeral = p256::SecretKey::random(&mut OsRng);
    let dek = derive_shared_key(&ephemeral, kas_public, &nanotdf_salt(NanoTdfVersion::V12)).unwrap();
    let header = Header::new(
        ResourceLocator::new(Protocol::Https, "kas.example.com")
            .with_identifier(b"e1".to_vec())
            .unwrap(),
        EccAndBindingMode::new(false, EccMode::Secp256r1),
        SymmetricAndPayloadConfig::new(PayloadSignatureMode::none(), SymmetricCipher::Aes256Gcm96),
        policy,
        ephemeral.public_key().to_encoded_point(true).as_bytes().to_vec(),
    )
    .unwrap();
    (header.to_bytes().unwrap(), dek.as_slice().to_vec())
}

pub fn nano_body(header: &[u8], client_pem: &str) -> Value {
    json!({
        "algorithm": "ec:secp256r1",
        "clientPublicKey": client_pem,
        "keyAccess": {
            "type": "remote",
            "url": KAS_URL,
            "protocol": "kas",
            "header": BASE64.encode(header),
        },
    })
}
