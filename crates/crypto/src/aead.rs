//! AES-256-GCM with selectable tag size
//!
//! TDF3 symmetric wrapping uses 16-byte tags; NanoTDF session wrapping uses
//! 12-byte tags. The `aes-gcm` crate supports tags of 12 to 16 bytes.

use aes_gcm::aead::consts::{U12, U13, U14, U15, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, TagSize};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// AES-GCM IV length used throughout OpenTDF
pub const IV_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum AeadError {
    #[error("invalid AES-256 key length: {0}")]
    InvalidKeyLength(usize),

    #[error("invalid IV length: expected {IV_SIZE}, got {0}")]
    InvalidIvLength(usize),

    #[error("unsupported GCM tag size: {0}")]
    UnsupportedTagSize(usize),

    #[error("ciphertext too short: {0} bytes")]
    Truncated(usize),

    #[error("AES-GCM encryption failed")]
    Encrypt,

    #[error("AES-GCM decryption failed")]
    Decrypt,
}

/// Generate a random 96-bit IV
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

fn seal_with<T: TagSize>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AeadError> {
    let cipher = AesGcm::<Aes256, U12, T>::new_from_slice(key)
        .map_err(|_| AeadError::InvalidKeyLength(key.len()))?;
    cipher
        .encrypt(GenericArray::from_slice(iv), plaintext)
        .map_err(|_| AeadError::Encrypt)
}

fn open_with<T: TagSize>(key: &[u8], iv: &[u8], body: &[u8]) -> Result<Vec<u8>, AeadError> {
    let cipher = AesGcm::<Aes256, U12, T>::new_from_slice(key)
        .map_err(|_| AeadError::InvalidKeyLength(key.len()))?;
    cipher
        .decrypt(GenericArray::from_slice(iv), body)
        .map_err(|_| AeadError::Decrypt)
}

/// Encrypt with an explicit IV, returning `ciphertext || tag`
pub fn seal(key: &[u8], iv: &[u8], plaintext: &[u8], tag_size: usize) -> Result<Vec<u8>, AeadError> {
    if iv.len() != IV_SIZE {
        return Err(AeadError::InvalidIvLength(iv.len()));
    }
    match tag_size {
        12 => seal_with::<U12>(key, iv, plaintext),
        13 => seal_with::<U13>(key, iv, plaintext),
        14 => seal_with::<U14>(key, iv, plaintext),
        15 => seal_with::<U15>(key, iv, plaintext),
        16 => seal_with::<U16>(key, iv, plaintext),
        other => Err(AeadError::UnsupportedTagSize(other)),
    }
}

/// Decrypt `ciphertext || tag` with an explicit IV
pub fn open(key: &[u8], iv: &[u8], body: &[u8], tag_size: usize) -> Result<Vec<u8>, AeadError> {
    if iv.len() != IV_SIZE {
        return Err(AeadError::InvalidIvLength(iv.len()));
    }
    if body.len() < tag_size {
        return Err(AeadError::Truncated(body.len()));
    }
    match tag_size {
        12 => open_with::<U12>(key, iv, body),
        13 => open_with::<U13>(key, iv, body),
        14 => open_with::<U14>(key, iv, body),
        15 => open_with::<U15>(key, iv, body),
        16 => open_with::<U16>(key, iv, body),
        other => Err(AeadError::UnsupportedTagSize(other)),
    }
}

/// Encrypt under a fresh random IV, returning `iv || ciphertext || tag`
pub fn seal_prefixed(key: &[u8], plaintext: &[u8], tag_size: usize) -> Result<Vec<u8>, AeadError> {
    let iv = generate_iv();
    let sealed = seal(key, &iv, plaintext, tag_size)?;
    let mut out = Vec::with_capacity(IV_SIZE + sealed.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypt `iv || ciphertext || tag`
pub fn open_prefixed(key: &[u8], data: &[u8], tag_size: usize) -> Result<Vec<u8>, AeadError> {
    if data.len() < IV_SIZE + tag_size {
        return Err(AeadError::Truncated(data.len()));
    }
    let (iv, body) = data.split_at(IV_SIZE);
    open(key, iv, body, tag_size)
}
