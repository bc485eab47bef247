//! OpenTDF KAS Cryptographic Operations
//!
//! Primitives used by the key access server while rewrapping keys:
//! - Zeroizing key types that clear memory on drop
//! - HMAC-SHA256 policy bindings with constant-time verification
//! - AES-256-GCM with the tag sizes used by TDF3 and NanoTDF
//! - NanoTDF and TDF HKDF salts
//! - RSA-OAEP and ECDH key encapsulation
//!
//! This crate performs no I/O.
//!
//! # Example
//!
//! ```
//! use opentdf_crypto::{calculate_policy_binding, verify_hmac, BindingEncoding};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dek = [7u8; 32];
//! let policy = "eyJ1dWlkIjoiMSJ9";
//!
//! let binding = calculate_policy_binding(policy, &dek, BindingEncoding::HexBase64)?;
//! let expected = BindingEncoding::HexBase64.decode(&binding)?;
//! verify_hmac(&dek, policy.as_bytes(), &expected)?;
//! # Ok(())
//! # }
//! ```

#![allow(deprecated)] // For aes_gcm generic_array 0.x

pub mod aead;
pub mod hmac;
pub mod kem;
pub mod salt;
pub mod types;

pub use aead::{AeadError, IV_SIZE};
pub use hmac::{calculate_hmac, calculate_policy_binding, verify_hmac, BindingEncoding, HmacError};
pub use kem::ec::{derive_shared_key, ecdh_shared_secret, EcCurve, EcWrappedKey, EcdhKem};
pub use kem::rsa::{OaepHash, RsaOaepKem};
pub use kem::{KemError, KeyEncapsulation};
pub use salt::{nanotdf_salt, tdf_salt, NanoTdfVersion, NANOTDF_MAGIC};
pub use types::{AesKey, KeyError, SymmetricKey};

// Re-export underlying crypto libraries so downstream crates agree on versions
pub use p256;
pub use rsa;
