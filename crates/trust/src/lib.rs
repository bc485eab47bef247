//! OpenTDF KAS key management
//!
//! Key material can live in different backends. This crate separates the two
//! capabilities a rewrap needs:
//!
//! - [`KeyIndex`]: find a key's metadata ([`KeyDetails`]) by id or algorithm
//! - [`KeyManager`]: use a key to unwrap a DEK into a [`ProtectedKey`], derive
//!   ECDH keys, and create session [`Encapsulator`]s
//!
//! Backends:
//! - [`InProcessKeys`]: keys resident in process memory (index and manager)
//! - [`FileKeyManager`]: private keys wrapped under a symmetric key read from a file
//! - [`TransitKeyManager`]: private keys unwrapped by a remote transit service
//! - [`PlatformKeyIndexer`]: index backed by the platform key registry
//! - [`DelegatingKeyManager`]: routes to a backend by [`KeyDetails::mode`]
//!
//! [`Standard`] holds the shared RSA/EC unwrap logic used by every backend once
//! a raw private key is available.

mod encapsulator;
mod error;
mod file;
mod in_process;
mod index;
mod key;
mod keypair;
mod manager;
mod platform;
mod protected;
mod standard;
mod transit;

pub use encapsulator::{EcSessionEncapsulator, Encapsulator, RsaEncapsulator};
pub use error::TrustError;
pub use file::{FileKeyManager, FILE_MANAGER_NAME};
pub use in_process::{InProcessKeys, IN_PROCESS_MANAGER_NAME};
pub use index::KeyIndex;
pub use key::{Algorithm, KeyDetails, KeyFormat, KeyIdentifier};
pub use keypair::{EcKeyPair, KeyPair, RsaKeyPair};
pub use manager::{DelegatingKeyManager, KeyManager};
pub use platform::{PlatformConfig, PlatformKeyIndexer};
pub use protected::ProtectedKey;
pub use standard::{parse_ec_public_key, Standard};
pub use transit::{TransitConfig, TransitKeyManager, TRANSIT_MANAGER_NAME};

pub use opentdf_crypto::EcCurve;
