use thiserror::Error;

use crate::domain::token_cache::TokenCache;

/// Bearer token for the file store. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        AccessToken(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken(***)")
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid authority URL")]
    InvalidAuthority,
    #[error("identity provider request failed")]
    Http,
    #[error("identity provider rejected the request: {error}")]
    Provider { error: String },
    #[error("failed to start the device code flow")]
    DeviceFlowUnavailable,
    #[error("device code expired before sign-in was completed")]
    DeviceFlowExpired,
    #[error("sign-in was declined")]
    DeviceFlowDeclined,
    #[error("unexpected response from the identity provider")]
    InvalidResponse,
}

#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a usable token, refreshing or re-consenting as needed. Any
    /// token obtained is written into `cache`; persisting it is the caller's job.
    async fn acquire_token(
        &self,
        cache: &mut TokenCache,
    ) -> error_stack::Result<AccessToken, AuthError>;
}
