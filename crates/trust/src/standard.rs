//! Unwrap logic shared by every backend once a raw private key is in hand

use crate::encapsulator::{EcSessionEncapsulator, Encapsulator};
use crate::error::TrustError;
use crate::key::Algorithm;
use crate::keypair::KeyPair;
use crate::protected::ProtectedKey;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use opentdf_crypto::{
    aead, derive_shared_key, tdf_salt, EcCurve, EcWrappedKey, EcdhKem, KeyEncapsulation,
    RsaOaepKem,
};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePublicKey;
use zeroize::Zeroizing;

/// GCM tag size used for TDF3 symmetric wrapping
const TDF_TAG_SIZE: usize = 16;

/// Parse a P-256 public key from SPKI PEM or a SEC1 point
pub fn parse_ec_public_key(bytes: &[u8]) -> Result<p256::PublicKey, TrustError> {
    let key = if bytes.starts_with(b"-----BEGIN") {
        let pem = std::str::from_utf8(bytes)
            .map_err(|_| TrustError::InvalidKey("EC public key PEM is not UTF-8".into()))?;
        p256::PublicKey::from_public_key_pem(pem)
            .map_err(|e| TrustError::InvalidKey(format!("EC public key: {}", e)))?
    } else {
        p256::PublicKey::from_sec1_bytes(bytes)
            .map_err(|e| TrustError::InvalidKey(format!("EC public key: {}", e)))?
    };
    Ok(key)
}

/// Default unwrap implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct Standard;

impl Standard {
    pub fn new() -> Self {
        Standard
    }

    /// Decrypt `ciphertext` with a raw private key PEM
    pub fn decrypt_asymmetric(
        &self,
        algorithm: Algorithm,
        private_key_pem: &str,
        ciphertext: &[u8],
        ephemeral_public_key: Option<&[u8]>,
    ) -> Result<ProtectedKey, TrustError> {
        let pair = KeyPair::from_pem(algorithm, private_key_pem)?;
        self.decrypt_with(&pair, ciphertext, ephemeral_public_key)
    }

    /// Decrypt with an already parsed keypair
    ///
    /// RSA uses OAEP with SHA-1 and no label. EC requires the sender's
    /// ephemeral public key and expects `iv || ciphertext || tag` under an
    /// HKDF key salted with `SHA256("TDF")`.
    pub fn decrypt_with(
        &self,
        pair: &KeyPair,
        ciphertext: &[u8],
        ephemeral_public_key: Option<&[u8]>,
    ) -> Result<ProtectedKey, TrustError> {
        match pair {
            KeyPair::Rsa(rsa) => {
                let dek = RsaOaepKem::default().unwrap(&ciphertext.to_vec(), rsa.private_key())?;
                Ok(ProtectedKey::new(dek))
            }
            KeyPair::Ec(ec) => {
                let ephemeral = ephemeral_public_key.ok_or_else(|| {
                    TrustError::InvalidKey("ephemeral public key required for EC decrypt".into())
                })?;
                let ephemeral = parse_ec_public_key(ephemeral)?;
                let wrapped = EcWrappedKey {
                    ephemeral_public_key: ephemeral.to_encoded_point(true).as_bytes().to_vec(),
                    ciphertext: ciphertext.to_vec(),
                };
                let dek = EcdhKem::new(tdf_salt(), TDF_TAG_SIZE).unwrap(&wrapped, ec.private_key())?;
                Ok(ProtectedKey::new(dek))
            }
        }
    }

    /// AES-GCM unwrap of a base64 `iv || ciphertext || tag` blob
    pub fn decrypt_symmetric(
        &self,
        key: &[u8],
        wrapped_base64: &str,
    ) -> Result<Zeroizing<Vec<u8>>, TrustError> {
        let wrapped = BASE64
            .decode(wrapped_base64.trim())
            .map_err(|e| TrustError::InvalidKey(format!("wrapped key is not base64: {}", e)))?;
        Ok(Zeroizing::new(aead::open_prefixed(key, &wrapped, TDF_TAG_SIZE)?))
    }

    /// ECDH between a KAS private key and a sender's ephemeral key, then HKDF
    pub fn derive_key(
        &self,
        private_key: &p256::SecretKey,
        ephemeral_public_key: &[u8],
        curve: EcCurve,
        salt: &[u8],
    ) -> Result<ProtectedKey, TrustError> {
        if curve != EcCurve::P256 {
            return Err(TrustError::UnsupportedAlgorithm(format!("ec:{}", curve)));
        }
        let ephemeral = parse_ec_public_key(ephemeral_public_key)?;
        let key = derive_shared_key(private_key, &ephemeral, salt)?;
        Ok(ProtectedKey::new(key.as_slice().to_vec()))
    }

    /// Session encapsulator for an EC client key (EC-wrapped TDF3 responses)
    pub fn generate_ec_session_key(
        &self,
        client_public_key_pem: &str,
    ) -> Result<Box<dyn Encapsulator>, TrustError> {
        let client = parse_ec_public_key(client_public_key_pem.as_bytes())?;
        Ok(Box::new(EcSessionEncapsulator::new(
            &client,
            &tdf_salt(),
            TDF_TAG_SIZE,
        )?))
    }
}
