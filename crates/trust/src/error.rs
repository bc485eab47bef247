//! Key management error types

use opentdf_crypto::{AeadError, HmacError, KemError};
use thiserror::Error;

/// Errors raised by key indexes and key managers
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("key not found: {0}")]
    NotFound(String),

    /// Capability not offered by this backend
    #[error("{0} not implemented")]
    NotImplemented(&'static str),

    #[error("invalid provider config field '{field}': {reason}")]
    Config { field: String, reason: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("policy binding mismatch")]
    BindingMismatch,
}

impl TrustError {
    pub(crate) fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TrustError::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for failures of the backend itself rather than of the input
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, TrustError::Transport(_) | TrustError::Unavailable(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            TrustError::NotFound(_) => "KEY_NOT_FOUND",
            TrustError::NotImplemented(_) => "NOT_IMPLEMENTED",
            TrustError::Config { .. } => "PROVIDER_CONFIG",
            TrustError::InvalidKey(_) => "INVALID_KEY",
            TrustError::Crypto(_) => "CRYPTO_ERROR",
            TrustError::Transport(_) => "TRANSPORT_ERROR",
            TrustError::Unavailable(_) => "UNAVAILABLE",
            TrustError::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
            TrustError::BindingMismatch => "BINDING_MISMATCH",
        }
    }
}

impl From<KemError> for TrustError {
    fn from(e: KemError) -> Self {
        match e {
            KemError::InvalidKey(reason) => TrustError::InvalidKey(reason),
            KemError::InvalidPublicKey => TrustError::InvalidKey("invalid public key".into()),
            KemError::InvalidPrivateKey => TrustError::InvalidKey("invalid private key".into()),
            KemError::UnsupportedAlgorithm(alg) => TrustError::UnsupportedAlgorithm(alg),
            other => TrustError::Crypto(other.to_string()),
        }
    }
}

impl From<AeadError> for TrustError {
    fn from(e: AeadError) -> Self {
        TrustError::Crypto(e.to_string())
    }
}

impl From<HmacError> for TrustError {
    fn from(e: HmacError) -> Self {
        match e {
            HmacError::VerificationFailed => TrustError::BindingMismatch,
            other => TrustError::Crypto(other.to_string()),
        }
    }
}
