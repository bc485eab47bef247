//! Per-request context: caller identity inputs, cancellation and deadline

use crate::error::RewrapError;
use crate::jwt::DpopKey;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What the transport layer knows about one inbound rewrap call
#[derive(Clone, Default)]
pub struct RequestContext {
    dpop_key: Option<DpopKey>,
    access_token: Option<String>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key the request token must be signed with
    pub fn with_dpop_key(mut self, key: DpopKey) -> Self {
        self.dpop_key = Some(key);
        self
    }

    /// The caller's bearer token, already authenticated by the transport
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn dpop_key(&self) -> Option<&DpopKey> {
        self.dpop_key.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail if the call was cancelled or its deadline has passed
    pub fn checkpoint(&self) -> Result<(), RewrapError> {
        if self.cancel.is_cancelled() {
            return Err(RewrapError::cancelled());
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(RewrapError::deadline_exceeded()),
            _ => Ok(()),
        }
    }

    /// Drive `fut` unless the call is cancelled or times out first
    pub async fn run<F, T>(&self, fut: F) -> Result<T, RewrapError>
    where
        F: Future<Output = T>,
    {
        self.checkpoint()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RewrapError::cancelled()),
            _ = deadline => Err(RewrapError::deadline_exceeded()),
            out = fut => Ok(out),
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("dpop_key", &self.dpop_key.is_some())
            .field("access_token", &self.access_token.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.run(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cancel_aborts_pending_call() {
        let cancel = CancellationToken::new();
        let ctx = RequestContext::new().with_cancellation(cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
        let err = ctx
            .run(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Cancelled);
        trigger.await.unwrap();
        assert_eq!(ctx.checkpoint().unwrap_err().code(), Code::Cancelled);
    }

    #[tokio::test]
    async fn test_deadline() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(10));
        let err = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert_eq!(ctx.checkpoint().unwrap_err().code(), Code::DeadlineExceeded);
    }
}
