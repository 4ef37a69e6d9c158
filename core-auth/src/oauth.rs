//! OAuth 2.0 Token Refresh
//!
//! The interactive consent flow happens outside this workspace; the uploader
//! only ever holds an already-granted token set. This module keeps that set
//! usable by exchanging the refresh token at the token endpoint (RFC 6749 §6).
//!
//! # Security
//!
//! - Never logs sensitive values (tokens, client secrets)
//! - Client errors from the token endpoint are not retried
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthClient, OAuthConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthConfig::youtube_upload("client-id", Some("client-secret".to_string()));
//! let client = OAuthClient::new(config, http_client);
//! let tokens = client.refresh_access_token("1//0g...").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Google's OAuth 2.0 token endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope required to insert videos and set thumbnails
pub const YOUTUBE_UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

/// Attempts made against the token endpoint before giving up
const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// OAuth 2.0 client configuration.
#[derive(Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret (optional for public clients)
    pub client_secret: Option<String>,
    /// Token endpoint URL
    pub token_url: String,
    /// Scopes the stored grant was issued for
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Configuration for a Google client authorized for YouTube uploads
    pub fn youtube_upload(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            scopes: vec![YOUTUBE_UPLOAD_SCOPE.to_string()],
        }
    }

    /// Override the token endpoint (e.g. a local test server)
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::InvalidConfig(
                "client_id cannot be empty".to_string(),
            ));
        }
        if !self.token_url.starts_with("https://") && !self.token_url.starts_with("http://") {
            return Err(AuthError::InvalidConfig(format!(
                "token_url must be an http(s) URL, got '{}'",
                self.token_url
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Talks to the token endpoint.
pub struct OAuthClient {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Refresh an access token using a refresh token.
    ///
    /// Transport failures and 5xx responses are retried up to three times with
    /// a 100ms, 200ms backoff. A 4xx response means the grant is revoked or the
    /// client is misconfigured and fails immediately. When the endpoint does not
    /// rotate the refresh token, the one passed in is kept.
    #[instrument(skip(self, refresh_token), fields(token_url = %self.config.token_url))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(ref client_secret) = self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }

        let encoded_body = serde_urlencoded::to_string(&params).map_err(|e| {
            AuthError::TokenRefreshFailed(format!("Failed to encode token request: {}", e))
        })?;
        let body = Bytes::from(encoded_body);

        debug!("Refreshing access token");

        let mut attempts = 0;

        loop {
            attempts += 1;

            let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.clone());

            let failure = match self.http_client.execute(request).await {
                Ok(response) if response.is_success() => {
                    let token_response: TokenResponse = response.json().map_err(|e| {
                        AuthError::TokenRefreshFailed(format!(
                            "Failed to parse token response: {}",
                            e
                        ))
                    })?;

                    info!(
                        expires_in = token_response.expires_in,
                        "Successfully refreshed access token"
                    );

                    return Ok(OAuthTokens::new(
                        token_response.access_token,
                        token_response
                            .refresh_token
                            .or_else(|| Some(refresh_token.to_string())),
                        token_response.expires_in,
                    ));
                }
                Ok(response) if response.is_client_error() => {
                    let error_body = response
                        .text()
                        .unwrap_or_else(|_| "Unable to read error response".to_string());

                    warn!(
                        status = response.status,
                        error = %error_body,
                        "Token refresh rejected"
                    );

                    return Err(AuthError::TokenRefreshFailed(format!(
                        "Token endpoint returned {}: {}",
                        response.status, error_body
                    )));
                }
                Ok(response) => AuthError::TokenRefreshFailed(format!(
                    "Token endpoint returned {}",
                    response.status
                )),
                Err(e) => AuthError::NetworkError(e.to_string()),
            };

            if attempts >= MAX_REFRESH_ATTEMPTS {
                warn!(attempts, error = %failure, "Token refresh failed, giving up");
                return Err(failure);
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                attempts,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

/// Token response from the OAuth provider.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600 // Default to 1 hour if not specified
}
