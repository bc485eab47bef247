//! RSA-OAEP Key Encapsulation Mechanism
//!
//! SHA-1 is the default OAEP digest for interoperability with existing
//! OpenTDF clients; SHA-256 is available for new deployments.

use super::{KemError, KeyEncapsulation};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::Sha256;

/// OAEP hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OaepHash {
    /// SHA-1 (OpenTDF wire default)
    #[default]
    Sha1,

    /// SHA-256
    Sha256,
}

/// RSA-OAEP key encapsulation mechanism
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaOaepKem {
    /// Hash algorithm for OAEP padding
    pub hash: OaepHash,
}

impl RsaOaepKem {
    pub fn new(hash: OaepHash) -> Self {
        RsaOaepKem { hash }
    }

    pub fn with_sha1() -> Self {
        Self::new(OaepHash::Sha1)
    }

    pub fn with_sha256() -> Self {
        Self::new(OaepHash::Sha256)
    }

    fn padding(&self) -> Oaep {
        match self.hash {
            OaepHash::Sha1 => Oaep::new::<Sha1>(),
            OaepHash::Sha256 => Oaep::new::<Sha256>(),
        }
    }
}

impl KeyEncapsulation for RsaOaepKem {
    type PublicKey = RsaPublicKey;
    type PrivateKey = RsaPrivateKey;
    type WrappedKey = Vec<u8>;

    fn wrap(&self, key: &[u8], public_key: &RsaPublicKey) -> Result<Vec<u8>, KemError> {
        public_key
            .encrypt(&mut OsRng, self.padding(), key)
            .map_err(|e| KemError::WrapError(format!("RSA-OAEP encryption failed: {}", e)))
    }

    fn unwrap(&self, wrapped: &Vec<u8>, private_key: &RsaPrivateKey) -> Result<Vec<u8>, KemError> {
        private_key
            .decrypt(self.padding(), wrapped)
            .map_err(|e| KemError::UnwrapError(format!("RSA-OAEP decryption failed: {}", e)))
    }
}

/// Parse an RSA public key from SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, KemError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| KemError::InvalidKey(format!("Failed to parse RSA public key: {}", e)))
}

/// Parse an RSA private key from PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM
pub fn parse_private_key_pem(pem: &str) -> Result<RsaPrivateKey, KemError> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| KemError::InvalidKey(format!("Failed to parse RSA private key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    fn generate_test_keypair() -> (RsaPublicKey, RsaPrivateKey) {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        (RsaPublicKey::from(&private_key), private_key)
    }

    #[test]
    fn test_rsa_oaep_roundtrip_sha1() {
        let (public_key, private_key) = generate_test_keypair();
        let kem = RsaOaepKem::with_sha1();

        let key = b"test_payload_key_32_bytes_long!";
        let wrapped = kem.wrap(key, &public_key).unwrap();
        assert_eq!(wrapped.len(), 256);
        let unwrapped = kem.unwrap(&wrapped, &private_key).unwrap();

        assert_eq!(key, unwrapped.as_slice());
    }

    #[test]
    fn test_digest_mismatch_fails() {
        let (public_key, private_key) = generate_test_keypair();

        let wrapped = RsaOaepKem::with_sha256().wrap(&[0x44u8; 32], &public_key).unwrap();
        assert!(RsaOaepKem::with_sha1().unwrap(&wrapped, &private_key).is_err());
        assert!(RsaOaepKem::with_sha256().unwrap(&wrapped, &private_key).is_ok());
    }

    #[test]
    fn test_pem_formats() {
        let (public_key, private_key) = generate_test_keypair();

        let spki = public_key.to_public_key_pem(LineEnding::LF).unwrap();
        assert_eq!(parse_public_key_pem(&spki).unwrap(), public_key);

        let pkcs8 = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let pkcs1 = private_key.to_pkcs1_pem(LineEnding::LF).unwrap();
        assert_eq!(parse_private_key_pem(&pkcs8).unwrap(), private_key);
        assert_eq!(parse_private_key_pem(&pkcs1).unwrap(), private_key);
    }

    #[test]
    fn test_rsa_invalid_pem_format() {
        assert!(parse_public_key_pem("not a valid pem").is_err());
        assert!(parse_public_key_pem("-----BEGIN PUBLIC KEY-----\nAAAA").is_err());
        assert!(parse_private_key_pem("").is_err());
    }

    #[test]
    fn test_rsa_unwrap_invalid_ciphertext() {
        let (public_key, private_key) = generate_test_keypair();
        let kem = RsaOaepKem::default();

        let mut wrapped = kem.wrap(b"test_payload_key_32_bytes_long!", &public_key).unwrap();
        wrapped[10] ^= 0xFF;

        assert!(kem.unwrap(&wrapped, &private_key).is_err());
    }
}
