//! OpenTDF Protocol Types
//!
//! This crate contains the wire types of the KAS rewrap protocol:
//! - Rewrap request/response and the signed `requestBody` claim
//! - The decoded TDF access policy
//! - The NanoTDF header codec
//!
//! This crate contains NO cryptographic operations and NO I/O.

pub mod kas;
pub mod nanotdf;
pub mod policy;

pub use kas::{
    algorithm, key_access_type, KeyAccess, PolicyBinding, RequestBody, RewrapRequest,
    RewrapResponse, SCHEMA_VERSION,
};
pub use nanotdf::{Header as NanoTdfHeader, HeaderError};
pub use policy::{Policy, PolicyAttribute, PolicyBody};
