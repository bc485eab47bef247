//! OpenTDF Key Access Server rewrap core
//!
//! A [`Provider`] verifies a DPoP-signed rewrap request, identifies the
//! caller, and releases a data encryption key re-encrypted to the client's
//! public key, but only after the policy binding and the access decision both
//! pass.
//!
//! - [`tdf3`]: RSA-OAEP (or EC-wrapped) key access objects
//! - [`nanotdf`]: ECDH-derived keys from a NanoTDF header
//!
//! Key material lives behind the `opentdf-trust` [`KeyIndex`] and
//! [`KeyManager`] traits.

pub mod access;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod jwt;
pub mod keyring;
pub mod logging;
pub mod nanotdf;
pub mod policy;
pub mod provider;
pub mod request;
pub mod tdf3;

pub use access::{
    can_access, AccessDecider, AccessError, AuthorizationClient, AuthorizationConfig, Entity,
};
pub use config::{ConfigError, KasConfig, NanoAccess, ServiceConfig};
pub use context::RequestContext;
pub use entity::{entity_info, EntityInfo};
pub use error::{Code, ErrorKind, RewrapError};
pub use jwt::{DpopKey, JwtError};
pub use keyring::{Keyring, KeyringKey};
pub use policy::verify_and_parse_policy;
pub use provider::{KasSettings, Provider};
pub use request::{verify_signed_request_token, ClientPublicKey, VerifiedRequest};

pub use opentdf_protocol::{RewrapRequest, RewrapResponse};
pub use opentdf_trust::{KeyIndex, KeyManager};
