pub mod device_flow;
pub mod id_token;

use chrono::{DateTime, Duration, Utc};
use error_stack::{report, ResultExt};
use reqwest::Client;
use tracing::instrument;
use url::Url;

use crate::config::auth_config::AuthConfig;
use crate::domain::token_cache::{CachedAccount, TokenCache};
use crate::ports::token_provider::{AccessToken, AuthError, TokenProvider};

use device_flow::{classify_token_response, PollOutcome, TokenResponse};

/// Always requested on top of the configured scopes, so that a refresh token
/// and an id token come back.
const IMPLICIT_SCOPES: &[&str] = &["offline_access", "openid", "profile"];

/// Public-client authenticator for the Microsoft identity platform.
pub struct MicrosoftAuthenticator {
    client: Client,
    client_id: String,
    scopes: Vec<String>,
    device_code_url: Url,
    token_url: Url,
}

impl std::fmt::Debug for MicrosoftAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrosoftAuthenticator")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("token_url", &self.token_url.as_str())
            .finish()
    }
}

impl MicrosoftAuthenticator {
    pub fn new(client: Client, config: &AuthConfig) -> error_stack::Result<Self, AuthError> {
        let authority = config.authority.trim_end_matches('/');
        let endpoint = |path: &str| {
            Url::parse(&format!("{}/oauth2/v2.0/{}", authority, path))
                .change_context(AuthError::InvalidAuthority)
                .attach_printable_lazy(|| format!("authority: {}", authority))
        };

        Ok(Self {
            client,
            client_id: config.client_id.to_string(),
            scopes: config.scopes.clone(),
            device_code_url: endpoint("devicecode")?,
            token_url: endpoint("token")?,
        })
    }

    fn requested_scope(&self) -> String {
        let mut scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        for implicit in IMPLICIT_SCOPES {
            if !scopes.iter().any(|s| s.eq_ignore_ascii_case(implicit)) {
                scopes.push(implicit);
            }
        }
        scopes.join(" ")
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, refresh_token: &str) -> error_stack::Result<TokenResponse, AuthError> {
        let scope = self.requested_scope();
        let (status, body) = device_flow::post_form(
            &self.client,
            &self.token_url,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("scope", scope.as_str()),
            ],
        )
        .await?;

        match classify_token_response(status, &body) {
            PollOutcome::Token(token) => Ok(token),
            PollOutcome::Failed(error, description) => {
                Err(report!(error)).attach_printable(description)
            }
            PollOutcome::Pending | PollOutcome::SlowDown => {
                Err(report!(AuthError::InvalidResponse))
                    .attach_printable("refresh grant answered with a device flow status")
            }
        }
    }
}

/// Turns a token response into a cache entry. Fields the provider left out on
/// a refresh are carried over from `previous`.
pub fn cached_account_from(
    response: TokenResponse,
    requested: &[String],
    previous: Option<&CachedAccount>,
    now: DateTime<Utc>,
) -> error_stack::Result<CachedAccount, AuthError> {
    let expires_at = u64::try_from(response.expires_in)
        .ok()
        .and_then(|secs| Duration::from_std(std::time::Duration::from_secs(secs)).ok())
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| report!(AuthError::InvalidResponse))
        .attach_printable_lazy(|| format!("expires_in out of range: {}", response.expires_in))?;

    let username = response
        .id_token
        .as_deref()
        .and_then(id_token::username_from_id_token)
        .or_else(|| previous.and_then(|account| account.username.clone()));

    let refresh_token = response
        .refresh_token
        .or_else(|| previous.and_then(|account| account.refresh_token.clone()));

    let scopes = match response.scope {
        Some(scope) => scope.split_whitespace().map(str::to_owned).collect(),
        None => requested.to_vec(),
    };

    Ok(CachedAccount {
        username,
        access_token: response.access_token,
        refresh_token,
        expires_at,
        scopes,
    })
}

#[async_trait::async_trait]
impl TokenProvider for MicrosoftAuthenticator {
    #[instrument(skip(self, cache), name = "MicrosoftAuthenticator::acquire_token")]
    async fn acquire_token(
        &self,
        cache: &mut TokenCache,
    ) -> error_stack::Result<AccessToken, AuthError> {
        let previous = cache.account().cloned();

        if let Some(account) = &previous {
            if account.is_fresh(Utc::now()) && account.covers(&self.scopes) {
                tracing::info!("Using cached token for {}", account.display_name());
                return Ok(AccessToken::new(account.access_token.clone()));
            }

            if let Some(refresh_token) = &account.refresh_token {
                tracing::trace!("Refreshing token for {}", account.display_name());
                match self.refresh(refresh_token).await {
                    Ok(response) => {
                        let refreshed =
                            cached_account_from(response, &self.scopes, Some(account), Utc::now())?;
                        tracing::info!("Refreshed token for {}", refreshed.display_name());
                        let token = AccessToken::new(refreshed.access_token.clone());
                        cache.store(refreshed);
                        return Ok(token);
                    }
                    Err(report) => {
                        tracing::warn!(
                            "Silent token refresh failed, falling back to device code sign-in: {:?}",
                            report
                        );
                    }
                }
            }
        }

        let response = device_flow::sign_in(
            &self.client,
            &self.device_code_url,
            &self.token_url,
            &self.client_id,
            &self.requested_scope(),
        )
        .await?;

        let account =
            cached_account_from(response, &self.scopes, previous.as_ref(), Utc::now())?;
        tracing::info!("Signed in as {}", account.display_name());
        let token = AccessToken::new(account.access_token.clone());
        cache.store(account);
        Ok(token)
    }
}
