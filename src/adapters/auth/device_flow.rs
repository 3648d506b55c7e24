//! OAuth 2.0 device authorization grant against the Microsoft identity
//! platform (`/devicecode` + `/token`).

use std::time::Duration;

use error_stack::{report, ResultExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::instrument;
use url::Url;

use crate::ports::token_provider::AuthError;

pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug)]
pub enum PollOutcome {
    Token(TokenResponse),
    Pending,
    SlowDown,
    Failed(AuthError, String),
}

/// Interprets one `/token` response.
pub fn classify_token_response(status: StatusCode, body: &str) -> PollOutcome {
    if status.is_success() {
        return match serde_json::from_str::<TokenResponse>(body) {
            Ok(token) => PollOutcome::Token(token),
            Err(err) => PollOutcome::Failed(AuthError::InvalidResponse, err.to_string()),
        };
    }

    let Ok(error) = serde_json::from_str::<ErrorResponse>(body) else {
        return PollOutcome::Failed(
            AuthError::Provider {
                error: format!("HTTP {}", status.as_u16()),
            },
            truncate(body),
        );
    };
    let description = error.error_description.unwrap_or_default();

    match error.error.as_str() {
        "authorization_pending" => PollOutcome::Pending,
        "slow_down" => PollOutcome::SlowDown,
        "authorization_declined" | "access_denied" => {
            PollOutcome::Failed(AuthError::DeviceFlowDeclined, description)
        }
        "expired_token" => PollOutcome::Failed(AuthError::DeviceFlowExpired, description),
        other => PollOutcome::Failed(
            AuthError::Provider {
                error: other.to_owned(),
            },
            description,
        ),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

pub async fn post_form(
    client: &Client,
    url: &Url,
    form: &[(&str, &str)],
) -> error_stack::Result<(StatusCode, String), AuthError> {
    let response = client
        .post(url.clone())
        .form(form)
        .send()
        .await
        .change_context(AuthError::Http)
        .attach_printable_lazy(|| format!("POST {}", url))?;

    let status = response.status();
    let body = response.text().await.change_context(AuthError::Http)?;
    Ok((status, body))
}

#[instrument(skip(client))]
pub async fn request_device_code(
    client: &Client,
    device_code_url: &Url,
    client_id: &str,
    scope: &str,
) -> error_stack::Result<DeviceCodeResponse, AuthError> {
    let (status, body) = post_form(
        client,
        device_code_url,
        &[("client_id", client_id), ("scope", scope)],
    )
    .await
    .change_context(AuthError::DeviceFlowUnavailable)?;

    if !status.is_success() {
        return Err(report!(AuthError::DeviceFlowUnavailable))
            .attach_printable(format!("status {}: {}", status.as_u16(), truncate(&body)));
    }

    serde_json::from_str(&body)
        .change_context(AuthError::DeviceFlowUnavailable)
        .attach_printable("device code response is missing user_code or device_code")
}

/// Polls the token endpoint until the user completes sign-in, declines, or
/// the device code expires.
#[instrument(skip(client, device))]
pub async fn poll_for_token(
    client: &Client,
    token_url: &Url,
    client_id: &str,
    device: &DeviceCodeResponse,
) -> error_stack::Result<TokenResponse, AuthError> {
    let deadline = Instant::now()
        .checked_add(Duration::from_secs(device.expires_in))
        .ok_or_else(|| report!(AuthError::InvalidResponse))
        .attach_printable_lazy(|| format!("expires_in out of range: {}", device.expires_in))?;
    let mut interval = Duration::from_secs(device.interval.max(1));

    loop {
        match Instant::now().checked_add(interval) {
            Some(next_poll) if next_poll <= deadline => {}
            _ => {
                return Err(report!(AuthError::DeviceFlowExpired))
                    .attach_printable(format!("gave up after {} seconds", device.expires_in));
            }
        }
        tokio::time::sleep(interval).await;

        let (status, body) = post_form(
            client,
            token_url,
            &[
                ("grant_type", DEVICE_CODE_GRANT),
                ("client_id", client_id),
                ("device_code", device.device_code.as_str()),
            ],
        )
        .await?;

        match classify_token_response(status, &body) {
            PollOutcome::Token(token) => return Ok(token),
            PollOutcome::Pending => tracing::trace!("Waiting for device code sign-in"),
            PollOutcome::SlowDown => {
                interval += SLOW_DOWN_STEP;
                tracing::trace!("Provider asked to slow down, polling every {:?}", interval);
            }
            PollOutcome::Failed(error, description) => {
                return Err(report!(error)).attach_printable(description);
            }
        }
    }
}

/// Full interactive sign-in: prints the code, then waits for completion.
pub async fn sign_in(
    client: &Client,
    device_code_url: &Url,
    token_url: &Url,
    client_id: &str,
    scope: &str,
) -> error_stack::Result<TokenResponse, AuthError> {
    let device = request_device_code(client, device_code_url, client_id, scope).await?;

    tracing::info!("User code: {}", device.user_code);
    tracing::info!(
        "Please visit {} and enter the code to authenticate.",
        device.verification_uri
    );
    if let Some(message) = &device.message {
        tracing::info!("{}", message);
    }

    poll_for_token(client, token_url, client_id, &device).await
}
