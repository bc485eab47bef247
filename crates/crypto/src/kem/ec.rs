//! Elliptic Curve Key Encapsulation
//!
//! ECDH key agreement on P-256 followed by HKDF-SHA256 and AES-256-GCM
//! wrapping. The HKDF salt distinguishes NanoTDF from EC-wrapped TDF3 keys.
//!
//! # Protocol Flow
//!
//! 1. Generate ephemeral EC key pair
//! 2. Perform ECDH with recipient's public key → shared secret
//! 3. Derive wrapping key using HKDF-SHA256 (empty info)
//! 4. Wrap payload key with AES-256-GCM
//! 5. Return ephemeral public key + wrapped key

use super::{KemError, KeyEncapsulation};
use crate::aead;
use crate::types::AesKey;
use hkdf::Hkdf;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Elliptic curve selection for ECDH
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    /// NIST P-256 (secp256r1)
    P256,
    /// NIST P-384 (secp384r1)
    P384,
    /// NIST P-521 (secp521r1)
    P521,
}

impl EcCurve {
    /// Size of one field element in bytes
    pub fn coordinate_size(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }

    /// SEC1 compressed point length
    pub fn compressed_point_size(self) -> usize {
        self.coordinate_size() + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            EcCurve::P256 => "secp256r1",
            EcCurve::P384 => "secp384r1",
            EcCurve::P521 => "secp521r1",
        }
    }
}

impl std::fmt::Display for EcCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw ECDH shared secret (the x-coordinate of the shared point)
pub fn ecdh_shared_secret(private_key: &SecretKey, public_key: &PublicKey) -> Zeroizing<Vec<u8>> {
    let shared = p256::ecdh::diffie_hellman(private_key.to_nonzero_scalar(), public_key.as_affine());
    Zeroizing::new(shared.raw_secret_bytes().to_vec())
}

/// ECDH followed by HKDF-SHA256 with the given salt and empty info
pub fn derive_shared_key(
    private_key: &SecretKey,
    public_key: &PublicKey,
    salt: &[u8],
) -> Result<AesKey, KemError> {
    let secret = ecdh_shared_secret(private_key, public_key);
    let hk = Hkdf::<Sha256>::new(Some(salt), &secret);
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(&[], &mut okm[..])
        .map_err(|_| KemError::KeyDerivationFailed)?;
    AesKey::from_slice(&okm[..]).map_err(|_| KemError::KeyDerivationFailed)
}

/// Output of an ECDH wrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcWrappedKey {
    /// SEC1 compressed ephemeral public key
    pub ephemeral_public_key: Vec<u8>,
    /// `iv || ciphertext || tag`
    pub ciphertext: Vec<u8>,
}

/// ECDH key encapsulation mechanism
#[derive(Debug, Clone)]
pub struct EcdhKem {
    pub curve: EcCurve,
    pub salt: Vec<u8>,
    pub tag_size: usize,
}

impl EcdhKem {
    pub fn new(salt: impl Into<Vec<u8>>, tag_size: usize) -> Self {
        EcdhKem {
            curve: EcCurve::P256,
            salt: salt.into(),
            tag_size,
        }
    }

    fn ensure_supported(&self) -> Result<(), KemError> {
        match self.curve {
            EcCurve::P256 => Ok(()),
            other => Err(KemError::UnsupportedAlgorithm(format!("ECDH on {}", other))),
        }
    }
}

impl KeyEncapsulation for EcdhKem {
    type PublicKey = PublicKey;
    type PrivateKey = SecretKey;
    type WrappedKey = EcWrappedKey;

    fn wrap(&self, key: &[u8], public_key: &PublicKey) -> Result<EcWrappedKey, KemError> {
        self.ensure_supported()?;
        let ephemeral = SecretKey::random(&mut OsRng);
        let wrapping_key = derive_shared_key(&ephemeral, public_key, &self.salt)?;
        let ciphertext = aead::seal_prefixed(wrapping_key.as_slice(), key, self.tag_size)
            .map_err(|e| KemError::WrapError(e.to_string()))?;

        Ok(EcWrappedKey {
            ephemeral_public_key: ephemeral
                .public_key()
                .to_encoded_point(true)
                .as_bytes()
                .to_vec(),
            ciphertext,
        })
    }

    fn unwrap(&self, wrapped: &EcWrappedKey, private_key: &SecretKey) -> Result<Vec<u8>, KemError> {
        self.ensure_supported()?;
        let ephemeral = PublicKey::from_sec1_bytes(&wrapped.ephemeral_public_key)
            .map_err(|_| KemError::InvalidPublicKey)?;
        let wrapping_key = derive_shared_key(private_key, &ephemeral, &self.salt)?;
        aead::open_prefixed(wrapping_key.as_slice(), &wrapped.ciphertext, self.tag_size)
            .map_err(|e| KemError::UnwrapError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::salt::{nanotdf_salt, tdf_salt, NanoTdfVersion};

    #[test]
    fn test_both_sides_derive_same_key() {
        let kas = SecretKey::random(&mut OsRng);
        let client = SecretKey::random(&mut OsRng);
        let salt = nanotdf_salt(NanoTdfVersion::V12);

        let a = derive_shared_key(&kas, &client.public_key(), &salt).unwrap();
        let b = derive_shared_key(&client, &kas.public_key(), &salt).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());

        let other = derive_shared_key(&client, &kas.public_key(), &tdf_salt()).unwrap();
        assert_ne!(a.as_slice(), other.as_slice());
    }

    #[test]
    fn test_wrap_unwrap() {
        let recipient = SecretKey::random(&mut OsRng);
        let kem = EcdhKem::new(tdf_salt(), 16);
        let dek = [0x5au8; 32];

        let wrapped = kem.wrap(&dek, &recipient.public_key()).unwrap();
        assert_eq!(wrapped.ephemeral_public_key.len(), 33);
        assert_eq!(wrapped.ciphertext.len(), 12 + 32 + 16);

        assert_eq!(kem.unwrap(&wrapped, &recipient).unwrap(), dek);
    }

    #[test]
    fn test_unwrap_with_wrong_salt_fails() {
        let recipient = SecretKey::random(&mut OsRng);
        let wrapped = EcdhKem::new(tdf_salt(), 16)
            .wrap(&[1u8; 32], &recipient.public_key())
            .unwrap();

        let kem = EcdhKem::new(nanotdf_salt(NanoTdfVersion::V12), 16);
        assert!(kem.unwrap(&wrapped, &recipient).is_err());
    }

    #[test]
    fn test_other_curves_unsupported() {
        let recipient = SecretKey::random(&mut OsRng);
        let mut kem = EcdhKem::new(tdf_salt(), 16);
        kem.curve = EcCurve::P384;

        assert!(matches!(
            kem.wrap(&[0u8; 32], &recipient.public_key()),
            Err(KemError::UnsupportedAlgorithm(_))
        ));
        assert_eq!(EcCurve::P521.compressed_point_size(), 67);
    }
}
