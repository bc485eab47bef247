//! HKDF salts for NanoTDF and EC-wrapped TDF3 keys
//!
//! NanoTDF: salt = SHA256(MAGIC_NUMBER + VERSION)

use sha2::{Digest, Sha256};

/// NanoTDF magic number prefix
pub const NANOTDF_MAGIC: &[u8] = b"L1";

/// NanoTDF version enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NanoTdfVersion {
    /// Version 1.2 - "L1L" header
    #[default]
    V12,
    /// Version 1.3 - "L1M" header
    V13,
}

impl NanoTdfVersion {
    pub const V12_BYTE: u8 = 0x4C; // 'L'
    pub const V13_BYTE: u8 = 0x4D; // 'M'

    pub fn byte(self) -> u8 {
        match self {
            NanoTdfVersion::V12 => Self::V12_BYTE,
            NanoTdfVersion::V13 => Self::V13_BYTE,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::V12_BYTE => Some(NanoTdfVersion::V12),
            Self::V13_BYTE => Some(NanoTdfVersion::V13),
            _ => None,
        }
    }
}

/// HKDF salt for keys derived from a NanoTDF header of the given version
pub fn nanotdf_salt(version: NanoTdfVersion) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(NANOTDF_MAGIC);
    hasher.update([version.byte()]);
    hasher.finalize().into()
}

/// HKDF salt for EC-wrapped TDF3 key access objects: SHA256("TDF")
pub fn tdf_salt() -> [u8; 32] {
    Sha256::digest(b"TDF").into()
}
