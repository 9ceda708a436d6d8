//! App-only authentication against the identity provider.
//!
//! The OAuth2 client-credentials grant is a single form POST; the returned
//! bearer token is attached to every Graph request for the rest of the run.
//! Tokens live roughly an hour, longer than any realistic batch, so there is
//! no refresh logic.

use crate::config::TenantConfig;
use crate::error::CourierError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Scope requesting every application permission granted to the identity.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// A bearer token. `Debug` never prints the secret.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    pub expires_in_secs: Option<u64>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_in_secs: None,
        }
    }

    /// Raw token for the `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Decode the (unverified) claims from the JWT payload.
    ///
    /// Returns `None` when the token is not a three-part JWT.
    pub fn claims(&self) -> Option<TokenClaims> {
        let payload = self.secret.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}

/// The claims worth showing when diagnosing permission problems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub aud: Option<String>,
    /// Application permissions, e.g. `Sites.ReadWrite.All`.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Delegated scopes; normally absent for app-only tokens.
    #[serde(default)]
    pub scp: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Token endpoint for the tenant.
pub fn token_url(tenant: &TenantConfig) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        tenant.login_base_url.trim_end_matches('/'),
        tenant.tenant_id
    )
}

/// Acquire an app-only token with the client-credentials grant.
///
/// # Errors
/// [`CourierError::AuthFailure`] on any transport error, non-success status
/// or a response without `access_token`.
pub async fn acquire_token(
    http: &reqwest::Client,
    tenant: &TenantConfig,
    timeout_secs: u64,
) -> Result<AccessToken, CourierError> {
    let url = token_url(tenant);
    info!("Requesting token for client {}", tenant.client_id);

    let form = [
        ("client_id", tenant.client_id.as_str()),
        ("client_secret", tenant.client_secret.as_str()),
        ("scope", GRAPH_DEFAULT_SCOPE),
        ("grant_type", "client_credentials"),
    ];

    let response = http
        .post(&url)
        .form(&form)
        .timeout(Duration::from_secs(timeout_secs))
        .send()
        .await
        .map_err(|e| CourierError::AuthFailure {
            detail: format!("token request failed: {e}"),
        })?;

    let status = response.status();
    let body: TokenResponse = response.json().await.map_err(|e| CourierError::AuthFailure {
        detail: format!("HTTP {status}: unreadable token response: {e}"),
    })?;

    match body.access_token {
        Some(token) if status.is_success() => {
            debug!("Token acquired (expires in {:?}s)", body.expires_in);
            Ok(AccessToken {
                secret: token,
                expires_in_secs: body.expires_in,
            })
        }
        _ => Err(CourierError::AuthFailure {
            detail: format!(
                "HTTP {status}: {} {}",
                body.error.unwrap_or_else(|| "no access_token".into()),
                body.error_description.unwrap_or_default()
            )
            .trim()
            .to_string(),
        }),
    }
}
