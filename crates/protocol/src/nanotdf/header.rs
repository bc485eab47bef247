//! NanoTDF Header Structures

use super::policy::Policy;
use super::reader::ByteReader;
use super::resource_locator::ResourceLocator;
use super::{HeaderError, GMAC_BINDING_SIZE, MAGIC_NUMBER, VERSION_V12, VERSION_V13};

/// Elliptic curve parameters for key agreement and signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EccMode {
    Secp256r1 = 0x00,
    Secp384r1 = 0x01,
    Secp521r1 = 0x02,
    Secp256k1 = 0x03,
}

impl EccMode {
    /// Parse from the low 3 bits
    pub fn from_bits(bits: u8) -> Result<Self, HeaderError> {
        match bits & 0x07 {
            0x00 => Ok(EccMode::Secp256r1),
            0x01 => Ok(EccMode::Secp384r1),
            0x02 => Ok(EccMode::Secp521r1),
            0x03 => Ok(EccMode::Secp256k1),
            value => Err(HeaderError::InvalidField {
                field: "ECC mode",
                value,
            }),
        }
    }

    pub fn to_bits(self) -> u8 {
        self as u8
    }

    /// Compressed public key size
    pub fn public_key_size(self) -> usize {
        match self {
            EccMode::Secp256r1 | EccMode::Secp256k1 => 33,
            EccMode::Secp384r1 => 49,
            EccMode::Secp521r1 => 67,
        }
    }

    /// ECDSA `r || s` size
    pub fn signature_size(self) -> usize {
        match self {
            EccMode::Secp256r1 | EccMode::Secp256k1 => 64,
            EccMode::Secp384r1 => 96,
            EccMode::Secp521r1 => 132,
        }
    }
}

/// ECC and Binding Mode (1 byte bitfield)
///
/// ```text
/// ┌─────────────┬──────────┬───────────────────┐
/// │USE_ECDSA(1b)│UNUSED(4b)│ECC Params Enum(3b)│
/// └─────────────┴──────────┴───────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EccAndBindingMode {
    /// ECDSA policy binding (true) or GMAC (false)
    pub use_ecdsa_binding: bool,
    /// Curve of the ephemeral key
    pub ecc_mode: EccMode,
}

impl EccAndBindingMode {
    pub fn new(use_ecdsa_binding: bool, ecc_mode: EccMode) -> Self {
        Self {
            use_ecdsa_binding,
            ecc_mode,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, HeaderError> {
        Ok(Self {
            use_ecdsa_binding: (byte & 0x80) != 0,
            ecc_mode: EccMode::from_bits(byte)?,
        })
    }

    pub fn to_byte(self) -> u8 {
        let ecdsa_bit = if self.use_ecdsa_binding { 0x80 } else { 0x00 };
        ecdsa_bit | self.ecc_mode.to_bits()
    }

    /// Size of the policy binding implied by this mode
    pub fn binding_size(self) -> usize {
        if self.use_ecdsa_binding {
            self.ecc_mode.signature_size()
        } else {
            GMAC_BINDING_SIZE
        }
    }
}

/// Symmetric cipher for payload encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SymmetricCipher {
    Aes256Gcm64 = 0x00,
    Aes256Gcm96 = 0x01,
    Aes256Gcm104 = 0x02,
    Aes256Gcm112 = 0x03,
    Aes256Gcm120 = 0x04,
    Aes256Gcm128 = 0x05,
}

impl SymmetricCipher {
    pub fn from_bits(bits: u8) -> Result<Self, HeaderError> {
        match bits & 0x0F {
            0x00 => Ok(SymmetricCipher::Aes256Gcm64),
            0x01 => Ok(SymmetricCipher::Aes256Gcm96),
            0x02 => Ok(SymmetricCipher::Aes256Gcm104),
            0x03 => Ok(SymmetricCipher::Aes256Gcm112),
            0x04 => Ok(SymmetricCipher::Aes256Gcm120),
            0x05 => Ok(SymmetricCipher::Aes256Gcm128),
            value => Err(HeaderError::InvalidField {
                field: "symmetric cipher",
                value,
            }),
        }
    }

    pub fn to_bits(self) -> u8 {
        self as u8
    }

    /// Authentication tag size in bytes
    pub fn tag_size(self) -> usize {
        match self {
            SymmetricCipher::Aes256Gcm64 => 8,
            SymmetricCipher::Aes256Gcm96 => 12,
            SymmetricCipher::Aes256Gcm104 => 13,
            SymmetricCipher::Aes256Gcm112 => 14,
            SymmetricCipher::Aes256Gcm120 => 15,
            SymmetricCipher::Aes256Gcm128 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSignatureMode {
    pub has_signature: bool,
    pub signature_ecc_mode: Option<EccMode>,
}

impl PayloadSignatureMode {
    pub fn none() -> Self {
        Self {
            has_signature: false,
            signature_ecc_mode: None,
        }
    }

    pub fn with_signature(ecc_mode: EccMode) -> Self {
        Self {
            has_signature: true,
            signature_ecc_mode: Some(ecc_mode),
        }
    }
}

/// Symmetric and Payload Config (1 byte bitfield)
///
/// ```text
/// ┌──────────────┬────────────────┬─────────────────────┐
/// │HAS_SIG(1b)   │Sig ECC Mode(3b)│Symmetric Cipher(4b) │
/// └──────────────┴────────────────┴─────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymmetricAndPayloadConfig {
    pub signature_mode: PayloadSignatureMode,
    pub symmetric_cipher: SymmetricCipher,
}

impl SymmetricAndPayloadConfig {
    pub fn new(signature_mode: PayloadSignatureMode, symmetric_cipher: SymmetricCipher) -> Self {
        Self {
            signature_mode,
            symmetric_cipher,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, HeaderError> {
        let has_signature = (byte & 0x80) != 0;
        let signature_ecc_mode = if has_signature {
            Some(EccMode::from_bits(byte >> 4)?)
        } else {
            None
        };

        Ok(Self {
            signature_mode: PayloadSignatureMode {
                has_signature,
                signature_ecc_mode,
            },
            symmetric_cipher: SymmetricCipher::from_bits(byte)?,
        })
    }

    pub fn to_byte(self) -> u8 {
        let sig_bit = if self.signature_mode.has_signature {
            0x80
        } else {
            0x00
        };
        let sig_ecc = self
            .signature_mode
            .signature_ecc_mode
            .map(|mode| mode.to_bits() << 4)
            .unwrap_or(0);
        sig_bit | sig_ecc | self.symmetric_cipher.to_bits()
    }
}

/// NanoTDF Header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Version byte following the "L1" magic (`L` or `M`)
    pub version: u8,
    pub kas: ResourceLocator,
    pub ecc_and_binding_mode: EccAndBindingMode,
    pub symmetric_and_payload_config: SymmetricAndPayloadConfig,
    pub policy: Policy,
    /// Sender's compressed ephemeral public key
    pub ephemeral_public_key: Vec<u8>,
}

impl Header {
    /// Build a v1.2 header, validating the ephemeral key size against the curve
    pub fn new(
        kas: ResourceLocator,
        ecc_and_binding_mode: EccAndBindingMode,
        symmetric_and_payload_config: SymmetricAndPayloadConfig,
        policy: Policy,
        ephemeral_public_key: Vec<u8>,
    ) -> Result<Self, HeaderError> {
        if ephemeral_public_key.len() != ecc_and_binding_mode.ecc_mode.public_key_size() {
            return Err(HeaderError::InvalidLength {
                field: "ephemeral public key",
                len: ephemeral_public_key.len(),
            });
        }

        Ok(Self {
            version: VERSION_V12,
            kas,
            ecc_and_binding_mode,
            symmetric_and_payload_config,
            policy,
            ephemeral_public_key,
        })
    }

    /// Decode a header from the start of `data`; trailing payload bytes are ignored
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        Self::parse_with_len(data).map(|(header, _)| header)
    }

    /// Decode a header and report how many bytes it occupied
    pub fn parse_with_len(data: &[u8]) -> Result<(Self, usize), HeaderError> {
        let mut reader = ByteReader::new(data);

        let magic = reader.take(2)?;
        if magic != MAGIC_NUMBER {
            return Err(HeaderError::InvalidMagic([magic[0], magic[1]]));
        }
        let version = reader.u8()?;
        if version != VERSION_V12 && version != VERSION_V13 {
            return Err(HeaderError::UnsupportedVersion(version));
        }

        let kas = ResourceLocator::read(&mut reader)?;
        let ecc_and_binding_mode = EccAndBindingMode::from_byte(reader.u8()?)?;
        let symmetric_and_payload_config = SymmetricAndPayloadConfig::from_byte(reader.u8()?)?;
        let policy = Policy::read(&mut reader, ecc_and_binding_mode)?;
        let ephemeral_public_key = reader
            .take(ecc_and_binding_mode.ecc_mode.public_key_size())?
            .to_vec();

        let header = Self {
            version,
            kas,
            ecc_and_binding_mode,
            symmetric_and_payload_config,
            policy,
            ephemeral_public_key,
        };
        Ok((header, reader.offset()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, HeaderError> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&MAGIC_NUMBER);
        out.push(self.version);
        self.kas.write(&mut out)?;
        out.push(self.ecc_and_binding_mode.to_byte());
        out.push(self.symmetric_and_payload_config.to_byte());
        self.policy.write(&mut out)?;
        out.extend_from_slice(&self.ephemeral_public_key);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nanotdf::resource_locator::Protocol;

    fn sample_header() -> Header {
        Header::new(
            ResourceLocator::new(Protocol::Https, b"kas.example.com".to_vec()),
            EccAndBindingMode::new(false, EccMode::Secp256r1),
            SymmetricAndPayloadConfig::new(
                PayloadSignatureMode::none(),
                SymmetricCipher::Aes256Gcm96,
            ),
            Policy::embedded_plaintext(br#"{"uuid":"x"}"#.to_vec(), vec![0x11; 8]),
            vec![0x02; 33],
        )
        .unwrap()
    }

    #[test]
    fn test_parse_ignores_trailing_payload() {
        let header = sample_header();
        let mut bytes = header.to_bytes().unwrap();
        let header_len = bytes.len();
        bytes.extend_from_slice(&[0xFF; 40]);

        let (parsed, consumed) = Header::parse_with_len(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(consumed, header_len);
        assert_eq!(&bytes[..3], b"L1L");
    }

    #[test]
    fn test_v13_accepted() {
        let mut header = sample_header();
        header.version = VERSION_V13;
        let bytes = header.to_bytes().unwrap();
        assert_eq!(&bytes[..3], b"L1M");
        assert_eq!(Header::parse(&bytes).unwrap().version, VERSION_V13);
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut bytes = sample_header().to_bytes().unwrap();
        bytes[2] = b'Z';
        assert_eq!(
            Header::parse(&bytes),
            Err(HeaderError::UnsupportedVersion(b'Z'))
        );
        bytes[0] = 0x00;
        assert!(matches!(
            Header::parse(&bytes),
            Err(HeaderError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_every_truncation_is_an_error() {
        let bytes = sample_header().to_bytes().unwrap();
        for len in 0..bytes.len() {
            assert!(Header::parse(&bytes[..len]).is_err(), "len {}", len);
        }
    }

    #[test]
    fn test_ephemeral_key_size_validated() {
        let result = Header::new(
            ResourceLocator::new(Protocol::Https, b"kas".to_vec()),
            EccAndBindingMode::new(false, EccMode::Secp384r1),
            SymmetricAndPayloadConfig::new(
                PayloadSignatureMode::none(),
                SymmetricCipher::Aes256Gcm128,
            ),
            Policy::embedded_plaintext(Vec::new(), vec![0; 8]),
            vec![0x02; 33],
        );
        assert!(matches!(
            result,
            Err(HeaderError::InvalidLength { len: 33, .. })
        ));
    }

    #[test]
    fn test_mode_bytes() {
        assert_eq!(EccAndBindingMode::new(true, EccMode::Secp256r1).to_byte(), 0x80);
        let config = SymmetricAndPayloadConfig::new(
            PayloadSignatureMode::with_signature(EccMode::Secp256r1),
            SymmetricCipher::Aes256Gcm128,
        );
        assert_eq!(config.to_byte(), 0x85);
        assert_eq!(SymmetricAndPayloadConfig::from_byte(0x85).unwrap(), config);
        assert!(SymmetricCipher::from_bits(0x07).is_err());
    }
}
