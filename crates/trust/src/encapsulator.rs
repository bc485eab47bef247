//! Recipient-bound encryption of rewrapped keys

use crate::error::TrustError;
use opentdf_crypto::kem::rsa::parse_public_key_pem;
use opentdf_crypto::{aead, derive_shared_key, AesKey, KeyEncapsulation, RsaOaepKem};
use p256::pkcs8::{EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use rsa::RsaPublicKey;

/// Encrypts a payload for one specific recipient key
pub trait Encapsulator: Send + Sync {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, TrustError>;

    /// PEM the recipient needs to decapsulate; `None` when the recipient's own
    /// private key suffices (RSA)
    fn public_key_pem(&self) -> Option<String>;
}

/// RSA-OAEP (SHA-1) to the client's public key
pub struct RsaEncapsulator {
    public_key: RsaPublicKey,
    kem: RsaOaepKem,
}

impl RsaEncapsulator {
    pub fn new(public_key: RsaPublicKey) -> Self {
        Self {
            public_key,
            kem: RsaOaepKem::default(),
        }
    }

    pub fn from_pem(pem: &str) -> Result<Self, TrustError> {
        Ok(Self::new(parse_public_key_pem(pem)?))
    }
}

impl Encapsulator for RsaEncapsulator {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, TrustError> {
        Ok(self.kem.wrap(data, &self.public_key)?)
    }

    fn public_key_pem(&self) -> Option<String> {
        None
    }
}

/// ECDH session with a freshly generated KAS ephemeral key
///
/// The session key is HKDF-SHA256(ECDH(ephemeral, client), salt). Output is
/// `iv || ciphertext || tag`; the ephemeral public key is published as SPKI PEM.
pub struct EcSessionEncapsulator {
    session_key: AesKey,
    session_public_key_pem: String,
    tag_size: usize,
}

impl EcSessionEncapsulator {
    pub fn new(
        client_public_key: &p256::PublicKey,
        salt: &[u8],
        tag_size: usize,
    ) -> Result<Self, TrustError> {
        let ephemeral = p256::SecretKey::random(&mut OsRng);
        let session_key = derive_shared_key(&ephemeral, client_public_key, salt)?;
        let session_public_key_pem = ephemeral
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| TrustError::Crypto(format!("encode session key: {}", e)))?;

        Ok(Self {
            session_key,
            session_public_key_pem,
            tag_size,
        })
    }

    pub fn session_public_key_pem(&self) -> &str {
        &self.session_public_key_pem
    }
}

impl Encapsulator for EcSessionEncapsulator {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, TrustError> {
        Ok(aead::seal_prefixed(
            self.session_key.as_slice(),
            data,
            self.tag_size,
        )?)
    }

    fn public_key_pem(&self) -> Option<String> {
        Some(self.session_public_key_pem.clone())
    }
}
