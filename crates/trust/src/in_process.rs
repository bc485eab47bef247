//! Keys held in process memory
//!
//! [`InProcessKeys`] is both an index and a manager: it is the fallback
//! backend when a key's mode names no registered manager.

use crate::encapsulator::Encapsulator;
use crate::error::TrustError;
use crate::index::KeyIndex;
use crate::key::{Algorithm, KeyDetails, KeyIdentifier};
use crate::keypair::KeyPair;
use crate::manager::KeyManager;
use crate::protected::ProtectedKey;
use crate::standard::Standard;
use async_trait::async_trait;
use opentdf_crypto::EcCurve;
use std::collections::{HashMap, HashSet};

pub const IN_PROCESS_MANAGER_NAME: &str = "opentdf.io/in-process";

/// Keypairs loaded at startup, keyed by kid
#[derive(Default)]
pub struct InProcessKeys {
    keys: HashMap<KeyIdentifier, KeyPair>,
    // insertion order, so selection is stable
    order: Vec<KeyIdentifier>,
    defaults: HashSet<KeyIdentifier>,
    legacy: HashSet<KeyIdentifier>,
    standard: Standard,
}

impl InProcessKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&mut self, kid: impl Into<KeyIdentifier>, pair: KeyPair) -> Result<(), TrustError> {
        let kid = kid.into();
        if self.keys.contains_key(&kid) {
            return Err(TrustError::config("kid", format!("duplicate key id {}", kid)));
        }
        self.order.push(kid.clone());
        self.keys.insert(kid, pair);
        Ok(())
    }

    /// Parse and add a private key PEM
    pub fn add_pem(
        &mut self,
        kid: impl Into<KeyIdentifier>,
        algorithm: Algorithm,
        pem: &str,
    ) -> Result<(), TrustError> {
        self.add_key(kid, KeyPair::from_pem(algorithm, pem)?)
    }

    pub fn with_key(mut self, kid: impl Into<KeyIdentifier>, pair: KeyPair) -> Result<Self, TrustError> {
        self.add_key(kid, pair)?;
        Ok(self)
    }

    /// Mark `kid` as the current key for its algorithm
    pub fn set_default(&mut self, kid: impl Into<KeyIdentifier>) -> Result<(), TrustError> {
        let kid = self.known(kid.into())?;
        self.defaults.insert(kid);
        Ok(())
    }

    /// Mark `kid` as usable for decrypt but not selectable as current
    pub fn set_legacy(&mut self, kid: impl Into<KeyIdentifier>) -> Result<(), TrustError> {
        let kid = self.known(kid.into())?;
        self.legacy.insert(kid);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn known(&self, kid: KeyIdentifier) -> Result<KeyIdentifier, TrustError> {
        if self.keys.contains_key(&kid) {
            Ok(kid)
        } else {
            Err(TrustError::NotFound(kid.to_string()))
        }
    }

    fn is_legacy(&self, kid: &KeyIdentifier) -> bool {
        self.legacy.contains(kid) && !self.defaults.contains(kid)
    }

    fn pair(&self, kid: &KeyIdentifier) -> Result<&KeyPair, TrustError> {
        self.keys
            .get(kid)
            .ok_or_else(|| TrustError::NotFound(kid.to_string()))
    }

    fn details(&self, kid: &KeyIdentifier) -> Result<KeyDetails, TrustError> {
        let pair = self.pair(kid)?;
        Ok(KeyDetails::new(kid.clone(), pair.algorithm(), pair.public_key_pem())
            .with_legacy(self.is_legacy(kid))
            .with_mode(IN_PROCESS_MANAGER_NAME))
    }

    fn of_algorithm(&self, algorithm: Algorithm) -> impl Iterator<Item = &KeyIdentifier> + '_ {
        self.order
            .iter()
            .filter(move |kid| matches!(self.keys.get(*kid), Some(p) if p.algorithm() == algorithm))
    }
}

#[async_trait]
impl KeyIndex for InProcessKeys {
    async fn find_key_by_id(&self, id: &KeyIdentifier) -> Result<KeyDetails, TrustError> {
        self.details(id)
    }

    async fn find_key_by_algorithm(
        &self,
        algorithm: Algorithm,
        include_legacy: bool,
    ) -> Result<KeyDetails, TrustError> {
        let chosen = self
            .of_algorithm(algorithm)
            .find(|kid| self.defaults.contains(*kid))
            .or_else(|| self.of_algorithm(algorithm).find(|kid| !self.legacy.contains(*kid)))
            .or_else(|| {
                include_legacy
                    .then(|| self.of_algorithm(algorithm).next())
                    .flatten()
            });
        match chosen {
            Some(kid) => self.details(kid),
            None => Err(TrustError::NotFound(format!("no key for algorithm {}", algorithm))),
        }
    }

    async fn list_keys(&self) -> Result<Vec<KeyDetails>, TrustError> {
        self.order.iter().map(|kid| self.details(kid)).collect()
    }
}

#[async_trait]
impl KeyManager for InProcessKeys {
    fn name(&self) -> &str {
        IN_PROCESS_MANAGER_NAME
    }

    async fn decrypt(
        &self,
        key_id: &KeyIdentifier,
        ciphertext: &[u8],
        ephemeral_public_key: Option<&[u8]>,
    ) -> Result<ProtectedKey, TrustError> {
        self.standard
            .decrypt_with(self.pair(key_id)?, ciphertext, ephemeral_public_key)
    }

    async fn derive_key(
        &self,
        key_id: &KeyIdentifier,
        ephemeral_public_key: &[u8],
        curve: EcCurve,
        salt: &[u8],
    ) -> Result<ProtectedKey, TrustError> {
        match self.pair(key_id)? {
            KeyPair::Ec(pair) => {
                self.standard
                    .derive_key(pair.private_key(), ephemeral_public_key, curve, salt)
            }
            KeyPair::Rsa(_) => Err(TrustError::InvalidKey(format!(
                "key {} is not an EC key",
                key_id
            ))),
        }
    }

    async fn generate_ec_session_key(
        &self,
        ephemeral_public_key: &str,
    ) -> Result<Box<dyn Encapsulator>, TrustError> {
        self.standard.generate_ec_session_key(ephemeral_public_key)
    }
}
