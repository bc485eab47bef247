//! NanoTDF Policy Structures

use super::header::EccAndBindingMode;
use super::reader::ByteReader;
use super::resource_locator::ResourceLocator;
use super::HeaderError;

/// Policy type indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PolicyType {
    /// Remote policy (reference via Resource Locator)
    Remote = 0x00,
    EmbeddedPlaintext = 0x01,
    /// Embedded policy encrypted under the payload key
    EmbeddedEncrypted = 0x02,
    /// Embedded policy encrypted with a separate key access
    EmbeddedEncryptedPolicyKeyAccess = 0x03,
}

impl PolicyType {
    pub fn from_byte(byte: u8) -> Result<Self, HeaderError> {
        match byte {
            0x00 => Ok(PolicyType::Remote),
            0x01 => Ok(PolicyType::EmbeddedPlaintext),
            0x02 => Ok(PolicyType::EmbeddedEncrypted),
            0x03 => Ok(PolicyType::EmbeddedEncryptedPolicyKeyAccess),
            value => Err(HeaderError::InvalidField {
                field: "policy type",
                value,
            }),
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Policy body variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyBody {
    Remote(ResourceLocator),
    EmbeddedPlaintext(Vec<u8>),
    EmbeddedEncrypted(Vec<u8>),
    EmbeddedEncryptedWithKeyAccess {
        content: Vec<u8>,
        /// KAS resource locator for the policy key
        key_access: ResourceLocator,
        /// Ephemeral public key for policy key derivation (curve sized)
        ephemeral_key: Vec<u8>,
    },
}

impl PolicyBody {
    pub fn policy_type(&self) -> PolicyType {
        match self {
            PolicyBody::Remote(_) => PolicyType::Remote,
            PolicyBody::EmbeddedPlaintext(_) => PolicyType::EmbeddedPlaintext,
            PolicyBody::EmbeddedEncrypted(_) => PolicyType::EmbeddedEncrypted,
            PolicyBody::EmbeddedEncryptedWithKeyAccess { .. } => {
                PolicyType::EmbeddedEncryptedPolicyKeyAccess
            }
        }
    }
}

/// Policy with cryptographic binding
///
/// The binding ties the policy to the payload key: an 8 byte GMAC tag, or an
/// ECDSA `r || s` signature sized by the header curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub body: PolicyBody,
    pub binding: Vec<u8>,
}

impl Policy {
    pub fn new(body: PolicyBody, binding: Vec<u8>) -> Self {
        Self { body, binding }
    }

    pub fn remote(locator: ResourceLocator, binding: Vec<u8>) -> Self {
        Self::new(PolicyBody::Remote(locator), binding)
    }

    pub fn embedded_plaintext(content: Vec<u8>, binding: Vec<u8>) -> Self {
        Self::new(PolicyBody::EmbeddedPlaintext(content), binding)
    }

    pub fn embedded_encrypted(content: Vec<u8>, binding: Vec<u8>) -> Self {
        Self::new(PolicyBody::EmbeddedEncrypted(content), binding)
    }

    pub(crate) fn read(
        reader: &mut ByteReader<'_>,
        mode: EccAndBindingMode,
    ) -> Result<Self, HeaderError> {
        let policy_type = PolicyType::from_byte(reader.u8()?)?;

        let body = match policy_type {
            PolicyType::Remote => PolicyBody::Remote(ResourceLocator::read(reader)?),
            PolicyType::EmbeddedPlaintext => {
                let len = reader.u16_be()? as usize;
                PolicyBody::EmbeddedPlaintext(reader.take(len)?.to_vec())
            }
            PolicyType::EmbeddedEncrypted => {
                let len = reader.u16_be()? as usize;
                PolicyBody::EmbeddedEncrypted(reader.take(len)?.to_vec())
            }
            PolicyType::EmbeddedEncryptedPolicyKeyAccess => {
                let len = reader.u16_be()? as usize;
                let content = reader.take(len)?.to_vec();
                let key_access = ResourceLocator::read(reader)?;
                let ephemeral_key = reader.take(mode.ecc_mode.public_key_size())?.to_vec();
                PolicyBody::EmbeddedEncryptedWithKeyAccess {
                    content,
                    key_access,
                    ephemeral_key,
                }
            }
        };

        let binding = reader.take(mode.binding_size())?.to_vec();
        Ok(Self { body, binding })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<(), HeaderError> {
        out.push(self.body.policy_type().to_byte());

        match &self.body {
            PolicyBody::Remote(locator) => locator.write(out)?,
            PolicyBody::EmbeddedPlaintext(content) | PolicyBody::EmbeddedEncrypted(content) => {
                write_content(out, content)?;
            }
            PolicyBody::EmbeddedEncryptedWithKeyAccess {
                content,
                key_access,
                ephemeral_key,
            } => {
                write_content(out, content)?;
                key_access.write(out)?;
                out.extend_from_slice(ephemeral_key);
            }
        }

        out.extend_from_slice(&self.binding);
        Ok(())
    }
}

fn write_content(out: &mut Vec<u8>, content: &[u8]) -> Result<(), HeaderError> {
    let len = u16::try_from(content.len()).map_err(|_| HeaderError::TooLong {
        field: "policy content",
        len: content.len(),
        max: u16::MAX as usize,
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(content);
    Ok(())
}
