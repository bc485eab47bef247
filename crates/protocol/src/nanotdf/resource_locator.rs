//! Resource Locator for NanoTDF
//!
//! The Resource Locator provides a compact way to reference external resources
//! like KAS endpoints and remote policies.

use super::reader::ByteReader;
use super::HeaderError;

/// Protocol type for resource location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Protocol {
    Http = 0x0,
    Https = 0x1,
    /// Shared Resource Directory (experimental)
    SharedResourceDirectory = 0xF,
}

impl Protocol {
    /// Parse protocol from the lower nibble
    pub fn from_bits(bits: u8) -> Result<Self, HeaderError> {
        match bits & 0x0F {
            0x0 => Ok(Protocol::Http),
            0x1 => Ok(Protocol::Https),
            0xF => Ok(Protocol::SharedResourceDirectory),
            other => Err(HeaderError::InvalidField {
                field: "resource locator protocol",
                value: other,
            }),
        }
    }

    pub fn to_bits(self) -> u8 {
        self as u8
    }
}

/// Identifier type and length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierType {
    None,
    TwoByte,
    EightByte,
    ThirtyTwoByte,
}

impl IdentifierType {
    /// Parse identifier type from the upper nibble
    pub fn from_bits(bits: u8) -> Result<Self, HeaderError> {
        match (bits >> 4) & 0x0F {
            0x0 => Ok(IdentifierType::None),
            0x1 => Ok(IdentifierType::TwoByte),
            0x2 => Ok(IdentifierType::EightByte),
            0x3 => Ok(IdentifierType::ThirtyTwoByte),
            other => Err(HeaderError::InvalidField {
                field: "resource locator identifier type",
                value: other,
            }),
        }
    }

    /// Upper nibble value
    pub fn to_bits(self) -> u8 {
        let value = match self {
            IdentifierType::None => 0x0,
            IdentifierType::TwoByte => 0x1,
            IdentifierType::EightByte => 0x2,
            IdentifierType::ThirtyTwoByte => 0x3,
        };
        value << 4
    }

    pub fn byte_length(self) -> usize {
        match self {
            IdentifierType::None => 0,
            IdentifierType::TwoByte => 2,
            IdentifierType::EightByte => 8,
            IdentifierType::ThirtyTwoByte => 32,
        }
    }

    fn for_length(len: usize) -> Result<Self, HeaderError> {
        match len {
            0 => Ok(IdentifierType::None),
            2 => Ok(IdentifierType::TwoByte),
            8 => Ok(IdentifierType::EightByte),
            32 => Ok(IdentifierType::ThirtyTwoByte),
            len => Err(HeaderError::InvalidLength {
                field: "resource locator identifier",
                len,
            }),
        }
    }
}

/// Resource Locator - compact reference to external resources
///
/// ```text
/// ┌────────────────┬──────────────┬────────────┬─────────────────────┐
/// │ Protocol (1B)  │ Body Len (1B)│ Body (var) │ Identifier (0-32B)  │
/// └────────────────┴──────────────┴────────────┴─────────────────────┘
/// ```
///
/// The protocol byte carries the identifier type in bits 7-4 and the
/// protocol in bits 3-0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    pub protocol: Protocol,
    pub identifier: Option<Vec<u8>>,
    /// Resource body (e.g., "kas.example.com/kas" for HTTPS)
    pub body: Vec<u8>,
}

impl ResourceLocator {
    pub fn new(protocol: Protocol, body: impl Into<Vec<u8>>) -> Self {
        Self {
            protocol,
            identifier: None,
            body: body.into(),
        }
    }

    /// Attach a 2, 8 or 32 byte identifier (such as a key id)
    pub fn with_identifier(mut self, identifier: Vec<u8>) -> Result<Self, HeaderError> {
        self.identifier = match IdentifierType::for_length(identifier.len())? {
            IdentifierType::None => None,
            _ => Some(identifier),
        };
        Ok(self)
    }

    pub fn identifier_type(&self) -> IdentifierType {
        self.identifier
            .as_ref()
            .and_then(|id| IdentifierType::for_length(id.len()).ok())
            .unwrap_or(IdentifierType::None)
    }

    pub fn from_url(url: &str) -> Result<Self, HeaderError> {
        if let Some(rest) = url.strip_prefix("http://") {
            Ok(Self::new(Protocol::Http, rest.as_bytes()))
        } else if let Some(rest) = url.strip_prefix("https://") {
            Ok(Self::new(Protocol::Https, rest.as_bytes()))
        } else {
            Err(HeaderError::NotUrl(url.to_string()))
        }
    }

    pub fn to_url(&self) -> Result<String, HeaderError> {
        let scheme = match self.protocol {
            Protocol::Http => "http://",
            Protocol::Https => "https://",
            Protocol::SharedResourceDirectory => {
                return Err(HeaderError::NotUrl("shared resource directory".to_string()))
            }
        };
        let body = String::from_utf8_lossy(&self.body);
        Ok(format!("{}{}", scheme, body))
    }

    pub(crate) fn read(reader: &mut ByteReader<'_>) -> Result<Self, HeaderError> {
        let header = reader.u8()?;
        let protocol = Protocol::from_bits(header)?;
        let identifier_type = IdentifierType::from_bits(header)?;

        let body_len = reader.u8()? as usize;
        let body = reader.take(body_len)?.to_vec();

        let identifier = match identifier_type.byte_length() {
            0 => None,
            n => Some(reader.take(n)?.to_vec()),
        };

        Ok(Self {
            protocol,
            identifier,
            body,
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<(), HeaderError> {
        if self.body.len() > u8::MAX as usize {
            return Err(HeaderError::TooLong {
                field: "resource locator body",
                len: self.body.len(),
                max: u8::MAX as usize,
            });
        }
        out.push(self.identifier_type().to_bits() | self.protocol.to_bits());
        out.push(self.body.len() as u8);
        out.extend_from_slice(&self.body);
        if let Some(id) = &self.identifier {
            out.extend_from_slice(id);
        }
        Ok(())
    }
}
