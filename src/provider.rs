//! Rewrap orchestrator
//!
//! [`Provider`] is the single entry point for rewrap calls: it verifies the
//! signed request, identifies the caller and dispatches on the requested
//! algorithm to the TDF3 or NanoTDF pipeline.

use crate::access::{AccessDecider, AuthorizationClient};
use crate::config::{ConfigError, NanoAccess, ServiceConfig};
use crate::context::RequestContext;
use crate::entity::entity_info;
use crate::error::RewrapError;
use crate::keyring::Keyring;
use crate::request::verify_signed_request_token;
use crate::{nanotdf, tdf3};
use opentdf_crypto::BindingEncoding;
use opentdf_protocol::{algorithm, RewrapRequest, RewrapResponse};
use opentdf_trust::{
    Algorithm, DelegatingKeyManager, FileKeyManager, InProcessKeys, KeyFormat, KeyIdentifier,
    KeyIndex, KeyManager, PlatformKeyIndexer, TransitKeyManager, TrustError,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-KAS behaviour switches, fixed at startup
#[derive(Debug, Clone, Default)]
pub struct KasSettings {
    pub uri: String,
    pub ec_tdf_enabled: bool,
    pub nano_access: NanoAccess,
    pub binding_encoding: BindingEncoding,
}

pub struct Provider {
    index: Arc<dyn KeyIndex>,
    manager: Arc<dyn KeyManager>,
    decider: Arc<dyn AccessDecider>,
    keyring: Keyring,
    settings: KasSettings,
}

impl Provider {
    pub fn new(
        index: Arc<dyn KeyIndex>,
        manager: Arc<dyn KeyManager>,
        decider: Arc<dyn AccessDecider>,
    ) -> Self {
        Self {
            index,
            manager,
            decider,
            keyring: Keyring::default(),
            settings: KasSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: KasSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_keyring(mut self, keyring: Keyring) -> Self {
        self.keyring = keyring;
        self
    }

    /// Wire key backends and the decision client from configuration
    ///
    /// In-process keys are read from their PEM files. The platform registry
    /// is the key index when configured; otherwise the in-process keys are.
    pub fn from_config(config: ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut keys = InProcessKeys::new();
        for key in &config.crypto.keys {
            let algorithm: Algorithm = key
                .alg
                .parse()
                .map_err(|e: TrustError| ConfigError::invalid("crypto.keys.alg", e.to_string()))?;
            let pem = std::fs::read_to_string(&key.private).map_err(|source| ConfigError::Io {
                path: key.private.clone(),
                source,
            })?;
            keys.add_pem(key.kid.as_str(), algorithm, &pem)?;
            debug!(kid = %key.kid, %algorithm, "loaded key");
        }

        let keyring = Keyring::from_config(&config.kas, |algorithm| {
            config
                .crypto
                .keys
                .iter()
                .find(|key| key.alg.parse::<Algorithm>().ok() == Some(algorithm))
                .map(|key| key.kid.clone())
        })?;
        for kid in keyring.defaults() {
            if let Err(e) = keys.set_default(kid.clone()) {
                debug!(%kid, error = %e, "keyring default is not an in-process key");
            }
        }
        for kid in keyring.legacy() {
            if let Err(e) = keys.set_legacy(kid.clone()) {
                debug!(%kid, error = %e, "keyring legacy key is not an in-process key");
            }
        }
        let keys = Arc::new(keys);

        let index: Arc<dyn KeyIndex> = match &config.platform {
            Some(platform) => {
                info!(endpoint = %platform.endpoint, "using platform key registry");
                Arc::new(PlatformKeyIndexer::new(platform.clone())?)
            }
            None => keys.clone(),
        };

        let mut manager = DelegatingKeyManager::new(index.clone(), keys.clone())
            .with_manager(keys.clone())
            .with_manager(Arc::new(FileKeyManager::new(index.clone())));
        if let Some(transit) = &config.transit {
            info!(address = %transit.address, "transit key manager enabled");
            manager = manager.with_manager(Arc::new(TransitKeyManager::new(
                transit.clone(),
                index.clone(),
            )?));
        }

        let authorization = config
            .authorization
            .clone()
            .ok_or_else(|| ConfigError::invalid("authorization", "decision endpoint required"))?;
        let decider = AuthorizationClient::new(authorization)
            .map_err(|e| ConfigError::invalid("authorization", e.to_string()))?;

        if config.kas.nano_access == NanoAccess::Upstream {
            warn!("nanotdf rewrap performs no access decision; it must be enforced upstream");
        }

        Ok(Self::new(index, Arc::new(manager), Arc::new(decider))
            .with_keyring(keyring)
            .with_settings(KasSettings {
                uri: config.kas.uri,
                ec_tdf_enabled: config.kas.ec_tdf_enabled,
                nano_access: config.kas.nano_access,
                binding_encoding: config.kas.binding_encoding,
            }))
    }

    pub fn settings(&self) -> &KasSettings {
        &self.settings
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    pub(crate) fn manager(&self) -> &dyn KeyManager {
        self.manager.as_ref()
    }

    pub(crate) fn decider(&self) -> &dyn AccessDecider {
        self.decider.as_ref()
    }

    /// Key to unwrap with: the one the client named, else the index's choice
    pub(crate) async fn resolve_key(
        &self,
        ctx: &RequestContext,
        kid: Option<&str>,
        algorithm: Algorithm,
    ) -> Result<KeyIdentifier, RewrapError> {
        if let Some(kid) = kid.filter(|kid| !kid.is_empty()) {
            return Ok(KeyIdentifier::new(kid));
        }
        let details = ctx
            .run(self.index.find_key_by_algorithm(algorithm, true))
            .await?
            .map_err(|e| {
                warn!(%algorithm, error = %e, "could not find key for algorithm");
                key_error(&e)
            })?;
        Ok(details.id().clone())
    }

    /// Public key of the current key for `algorithm`
    pub async fn public_key(
        &self,
        ctx: &RequestContext,
        algorithm: Algorithm,
        format: KeyFormat,
    ) -> Result<String, RewrapError> {
        let lookup = async {
            match self.keyring.current(algorithm) {
                Some(kid) => self.index.find_key_by_id(kid).await,
                None => self.index.find_key_by_algorithm(algorithm, false).await,
            }
        };
        let details = ctx.run(lookup).await?.map_err(|e| {
            warn!(%algorithm, error = %e, "public key lookup failed");
            match e {
                TrustError::NotFound(_) => RewrapError::not_found("key not found"),
                other => key_error(&other),
            }
        })?;
        details.export_public_key(format).map_err(|e| {
            warn!(kid = %details.id(), error = %e, "public key export failed");
            RewrapError::internal()
        })
    }

    /// Handle one rewrap call
    pub async fn rewrap(
        &self,
        ctx: &RequestContext,
        request: &RewrapRequest,
    ) -> Result<RewrapResponse, RewrapError> {
        let verified = verify_signed_request_token(ctx, request)?;
        let entity = entity_info(ctx)?;

        let key_access = &verified.body.key_access;
        if !self.settings.uri.is_empty() && !key_access.url.starts_with(&self.settings.uri) {
            info!(
                url = %key_access.url,
                kas_uri = %self.settings.uri,
                "mismatched key access url"
            );
        }

        let requested = if verified.body.algorithm.is_empty() {
            algorithm::RSA_2048
        } else {
            verified.body.algorithm.as_str()
        };
        debug!(algorithm = requested, "dispatch rewrap");

        match requested {
            algorithm::EC_P256 => nanotdf::rewrap(self, ctx, &verified, &entity).await,
            alg if alg.starts_with("rsa:") => tdf3::rewrap(self, ctx, &verified, &entity).await,
            other => {
                warn!(algorithm = other, "unsupported rewrap algorithm");
                Err(RewrapError::bad_request())
            }
        }
    }

    /// Release backend resources
    pub async fn close(&self) {
        self.manager.close().await;
    }
}

/// Map a key backend failure: backend outages are retryable, the rest is the
/// caller's key reference
pub(crate) fn key_error(e: &TrustError) -> RewrapError {
    if e.is_backend_failure() {
        RewrapError::unavailable()
    } else {
        RewrapError::bad_request()
    }
}
