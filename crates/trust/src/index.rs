use crate::error::TrustError;
use crate::key::{Algorithm, KeyDetails, KeyIdentifier};
use async_trait::async_trait;

/// Looks up key metadata
///
/// Every lookup reaches the backing store; implementations do not cache
/// across calls. Not-found and transport failures stay distinguishable
/// ([`TrustError::NotFound`] vs [`TrustError::Transport`]/[`TrustError::Unavailable`]).
#[async_trait]
pub trait KeyIndex: Send + Sync {
    async fn find_key_by_id(&self, id: &KeyIdentifier) -> Result<KeyDetails, TrustError>;

    /// Current key for `algorithm`; legacy keys only when `include_legacy`
    async fn find_key_by_algorithm(
        &self,
        algorithm: Algorithm,
        include_legacy: bool,
    ) -> Result<KeyDetails, TrustError>;

    async fn list_keys(&self) -> Result<Vec<KeyDetails>, TrustError>;
}
