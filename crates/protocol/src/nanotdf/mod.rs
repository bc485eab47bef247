//! NanoTDF header codec
//!
//! Only the header is decoded: the KAS needs the KAS locator, the curve and
//! binding mode, the policy and the sender's ephemeral public key. Payload and
//! signature decoding are out of scope.
//!
//! ## Layout
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Magic "L1" + version ('L' or 'M') (3B) │
//! │ KAS resource locator (var)             │
//! │ ECC and binding mode (1B)              │
//! │ Symmetric and payload config (1B)      │
//! │ Policy + binding (var)                 │
//! │ Ephemeral public key (33/49/67B)       │
//! └────────────────────────────────────────┘
//! ```
//!
//! All multi-byte integers are big-endian.

use thiserror::Error;

pub mod header;
pub mod policy;
mod reader;
pub mod resource_locator;

pub use header::{
    EccAndBindingMode, EccMode, Header, PayloadSignatureMode, SymmetricAndPayloadConfig,
    SymmetricCipher,
};
pub use policy::{Policy, PolicyBody, PolicyType};
pub use resource_locator::{IdentifierType, Protocol, ResourceLocator};

/// Magic number prefix shared by every NanoTDF version
pub const MAGIC_NUMBER: [u8; 2] = [0x4C, 0x31];

/// Version byte for NanoTDF v1.2 ("L1L")
pub const VERSION_V12: u8 = 0x4C;

/// Version byte for NanoTDF v1.3 ("L1M")
pub const VERSION_V13: u8 = 0x4D;

/// Length of the GMAC policy binding
pub const GMAC_BINDING_SIZE: usize = 8;

/// Errors raised while decoding or encoding a NanoTDF header
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header truncated: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("invalid magic number: {0:02X?}")]
    InvalidMagic([u8; 2]),

    #[error("unsupported NanoTDF version byte: 0x{0:02X}")]
    UnsupportedVersion(u8),

    #[error("invalid {field}: 0x{value:02X}")]
    InvalidField { field: &'static str, value: u8 },

    #[error("{field} too long: {len} bytes (max {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid {field} length: {len}")]
    InvalidLength { field: &'static str, len: usize },

    #[error("resource locator is not a URL: {0}")]
    NotUrl(String),
}
