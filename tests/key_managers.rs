//! Rewrap through configured key backends
//!
//! The key registry, transit service and authorization service are faked with
//! mockito; file-wrapped keys live in temp directories.

mod common;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use common::*;
use mockito::{Matcher, Server, ServerGuard};
use opentdf_access::{Code, Provider, RewrapError, RewrapResponse, ServiceConfig};
use opentdf_crypto::{aead, KeyEncapsulation, RsaOaepKem};
use opentdf_trust::RsaKeyPair;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use std::path::Path;

const GET_KEY: &str = "/policy.kasregistry.KeyAccessServerRegistryService/GetKey";
const DECISIONS: &str = "/authorization.AuthorizationService/GetDecisions";
const DEK: [u8; 32] = [0x17; 32];

fn registry_key(kid: &str, pair: &RsaKeyPair, private_ctx: Value, provider: Value) -> Value {
    json!({
        "key": {
            "keyId": kid,
            "keyAlgorithm": "ALGORITHM_RSA_2048",
            "keyStatus": "KEY_STATUS_ACTIVE",
            "publicKeyCtx": BASE64.encode(json!({"pubKey": pair.public_key_pem()}).to_string()),
            "privateKeyCtx": BASE64.encode(private_ctx.to_string()),
            "providerConfig": {
                "name": provider["name"],
                "configJson": BASE64.encode(provider["config"].to_string()),
            },
        }
    })
}

async fn permit_decisions(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", DECISIONS)
        .with_body(r#"{"decisionResponses":[{"decision":"DECISION_PERMIT"}]}"#)
        .create_async()
        .await
}

fn config(raw: Value) -> ServiceConfig {
    ServiceConfig::from_json(&raw.to_string()).unwrap()
}

async fn rewrap_rsa(
    provider: &Provider,
    kas: &RsaKeyPair,
    kid: Option<&str>,
) -> (RsaPrivateKey, Result<RewrapResponse, RewrapError>) {
    let (client, client_pem) = client_rsa();
    let (signing, ctx) = dpop_context(json!({"sub": "alice", "cid": "sdk"}));
    let mut body = tdf3_body(kas, &DEK, &client_pem);
    match kid {
        Some(kid) => body["keyAccess"]["kid"] = json!(kid),
        None => {
            body["keyAccess"].as_object_mut().unwrap().remove("kid");
        }
    }
    let result = provider.rewrap(&ctx, &signed_request(&body, &signing)).await;
    (client, result)
}

fn unwrap_for(client: &RsaPrivateKey, response: &RewrapResponse) -> Vec<u8> {
    RsaOaepKem::default()
        .unwrap(&response.entity_wrapped_key, client)
        .unwrap()
}

fn write_private_pem(dir: &Path, name: &str, pair: &RsaKeyPair) -> String {
    let path = dir.join(name);
    std::fs::write(&path, rsa_private_pem(pair.private_key())).unwrap();
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_in_process_keys_from_config() {
    let mut server = Server::new_async().await;
    let decisions = permit_decisions(&mut server).await;
    let dir = tempfile::tempdir().unwrap();
    let kas = RsaKeyPair::generate(2048).unwrap();
    let path = write_private_pem(dir.path(), "kas-private.pem", &kas);

    let provider = Provider::from_config(config(json!({
        "kas": {"uri": KAS_URL, "keyring": [{"alg": "rsa:2048", "kid": "r1"}]},
        "crypto": {"keys": [{"kid": "r1", "alg": "rsa:2048", "private": path}]},
        "authorization": {"endpoint": server.url()},
    })))
    .unwrap();

    let (client, result) = rewrap_rsa(&provider, &kas, None).await;
    assert_eq!(unwrap_for(&client, &result.unwrap()), DEK);
    decisions.assert_async().await;
}

#[tokio::test]
async fn test_file_wrapped_key_from_registry() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let kek = [0x33u8; 32];
    let kek_path = dir.path().join("kek");
    std::fs::write(&kek_path, kek).unwrap();

    let kas = RsaKeyPair::generate(2048).unwrap();
    let sealed = aead::seal_prefixed(&kek, rsa_private_pem(kas.private_key()).as_bytes(), 16).unwrap();
    let registry = server
        .mock("POST", GET_KEY)
        .match_body(Matcher::Json(json!({"keyId": "file-1"})))
        .with_body(
            registry_key(
                "file-1",
                &kas,
                json!({"wrappedKey": BASE64.encode(sealed)}),
                json!({"name": "opentdf.io/file", "config": {"filepath": kek_path}}),
            )
            .to_string(),
        )
        .expect_at_least(1)
        .create_async()
        .await;
    let decisions = permit_decisions(&mut server).await;

    let provider = Provider::from_config(config(json!({
        "kas": {"uri": KAS_URL},
        "platform": {"endpoint": server.url()},
        "authorization": {"endpoint": server.url()},
    })))
    .unwrap();

    let (client, result) = rewrap_rsa(&provider, &kas, Some("file-1")).await;
    assert_eq!(unwrap_for(&client, &result.unwrap()), DEK);
    registry.assert_async().await;
    decisions.assert_async().await;
}

#[tokio::test]
async fn test_transit_wrapped_key_from_registry() {
    let mut server = Server::new_async().await;
    let kas = RsaKeyPair::generate(2048).unwrap();

    let _registry = server
        .mock("POST", GET_KEY)
        .with_body(
            registry_key(
                "bao-1",
                &kas,
                json!({"wrappedKey": BASE64.encode("vault:v1:c2VjcmV0"), "keyID": "kas-transit"}),
                json!({"name": "openbao", "config": {}}),
            )
            .to_string(),
        )
        .expect_at_least(1)
        .create_async()
        .await;
    let transit = server
        .mock("POST", "/v1/transit/decrypt/kas-transit")
        .match_header("X-Vault-Token", "test-token")
        .match_body(Matcher::Json(json!({"ciphertext": "vault:v1:c2VjcmV0"})))
        .with_body(
            json!({"data": {"plaintext": BASE64.encode(rsa_private_pem(kas.private_key()))}})
                .to_string(),
        )
        .create_async()
        .await;
    let _decisions = permit_decisions(&mut server).await;

    let provider = Provider::from_config(config(json!({
        "platform": {"endpoint": server.url()},
        "transit": {"address": server.url(), "token": "test-token"},
        "authorization": {"endpoint": server.url()},
    })))
    .unwrap();

    let (client, result) = rewrap_rsa(&provider, &kas, Some("bao-1")).await;
    assert_eq!(unwrap_for(&client, &result.unwrap()), DEK);
    transit.assert_async().await;
}

#[tokio::test]
async fn test_registry_outage_is_unavailable() {
    let mut server = Server::new_async().await;
    let _registry = server
        .mock("POST", GET_KEY)
        .with_status(503)
        .create_async()
        .await;
    let provider = Provider::from_config(config(json!({
        "platform": {"endpoint": server.url()},
        "authorization": {"endpoint": server.url()},
    })))
    .unwrap();

    let kas = RsaKeyPair::generate(2048).unwrap();
    let (_, result) = rewrap_rsa(&provider, &kas, Some("file-1")).await;
    let err = result.unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unknown_registry_key_is_bad_request() {
    let mut server = Server::new_async().await;
    let _registry = server
        .mock("POST", GET_KEY)
        .with_status(404)
        .with_body(r#"{"code":"not_found","message":"key not found"}"#)
        .create_async()
        .await;
    let provider = Provider::from_config(config(json!({
        "platform": {"endpoint": server.url()},
        "authorization": {"endpoint": server.url()},
    })))
    .unwrap();

    let kas = RsaKeyPair::generate(2048).unwrap();
    let (_, result) = rewrap_rsa(&provider, &kas, Some("missing")).await;
    assert_eq!(result.unwrap_err().message(), "bad request");
}

#[tokio::test]
async fn test_decision_service_failure_is_forbidden() {
    let mut server = Server::new_async().await;
    let _decisions = server
        .mock("POST", DECISIONS)
        .with_status(500)
        .create_async()
        .await;
    let dir = tempfile::tempdir().unwrap();
    let kas = RsaKeyPair::generate(2048).unwrap();
    let path = write_private_pem(dir.path(), "kas.pem", &kas);

    let provider = Provider::from_config(config(json!({
        "crypto": {"keys": [{"kid": "r1", "alg": "rsa:2048", "private": path}]},
        "authorization": {"endpoint": server.url()},
    })))
    .unwrap();

    let (_, result) = rewrap_rsa(&provider, &kas, Some("r1")).await;
    assert_eq!(result.unwrap_err().code(), Code::PermissionDenied);
}
