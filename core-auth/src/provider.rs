//! # Credential Providers
//!
//! The upload engine never handles refresh tokens. It asks a
//! [`CredentialProvider`] for an [`AuthenticatedClient`] before every request
//! and gets back a bearer token that is valid for at least the refresh buffer.
//!
//! ## Token refresh
//!
//! [`OAuthCredentialProvider`] refreshes when the cached token is inside the
//! 5-minute expiry buffer. Refreshes are serialized by a `tokio::sync::Mutex`,
//! so concurrent uploads sharing one provider trigger a single refresh request.

use crate::error::{AuthError, Result};
use crate::oauth::OAuthClient;
use crate::token_store::TokenStore;
use crate::types::{OAuthTokens, TOKEN_REFRESH_BUFFER_SECS};
use async_trait::async_trait;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

/// Upper bound on one refresh, including its internal retries
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Label used for events about the single stored credential
const DEFAULT_PROFILE: &str = "default";

/// A bearer credential ready to be attached to a request
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedClient {
    access_token: String,
}

impl AuthenticatedClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Value of the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Supplies authenticated clients to the upload engine
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns a client whose token is currently valid, refreshing if needed.
    ///
    /// # Errors
    ///
    /// Any `AuthError` is final for the calling upload.
    async fn get_client(&self) -> Result<AuthenticatedClient>;
}

/// Credential provider backed by a stored OAuth grant
pub struct OAuthCredentialProvider {
    oauth: OAuthClient,
    store: Arc<dyn TokenStore>,
    cached: Mutex<Option<OAuthTokens>>,
    event_bus: Option<EventBus>,
    profile_id: String,
    refresh_buffer_secs: i64,
    refresh_timeout: Duration,
}

impl OAuthCredentialProvider {
    pub fn new(oauth: OAuthClient, store: Arc<dyn TokenStore>) -> Self {
        Self {
            oauth,
            store,
            cached: Mutex::new(None),
            event_bus: None,
            profile_id: DEFAULT_PROFILE.to_string(),
            refresh_buffer_secs: TOKEN_REFRESH_BUFFER_SECS,
            refresh_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    /// Publish refresh events on `event_bus`
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Label reported in auth events
    pub fn with_profile_id(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = profile_id.into();
        self
    }

    pub fn with_refresh_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = refresh_timeout;
        self
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Auth(event)).ok();
        }
    }

    fn report_failure(&self, err: &AuthError) {
        self.emit(AuthEvent::AuthError {
            profile_id: Some(self.profile_id.clone()),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        });
    }

    async fn refresh(&self, tokens: &OAuthTokens) -> Result<OAuthTokens> {
        let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
            error!("No refresh token available");
            AuthError::NoRefreshToken
        })?;

        self.emit(AuthEvent::TokenRefreshing {
            profile_id: self.profile_id.clone(),
        });

        let refreshed = match timeout(
            self.refresh_timeout,
            self.oauth.refresh_access_token(refresh_token),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(AuthError::OperationTimeout {
                    operation: "token refresh".to_string(),
                })
            }
        };

        self.store.save(&refreshed).await?;

        self.emit(AuthEvent::TokenRefreshed {
            profile_id: self.profile_id.clone(),
            expires_at: refreshed.expires_at.timestamp().max(0) as u64,
        });

        Ok(refreshed)
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentialProvider {
    #[instrument(skip(self), fields(profile_id = %self.profile_id))]
    async fn get_client(&self) -> Result<AuthenticatedClient> {
        // Held across the refresh so concurrent callers wait for one refresh
        let mut cached = self.cached.lock().await;

        let tokens = match cached.take() {
            Some(tokens) => tokens,
            None => self.store.load().await?.ok_or_else(|| {
                error!("No stored tokens");
                AuthError::NotAuthenticated
            })?,
        };

        if !tokens.is_expired_with_buffer(self.refresh_buffer_secs) {
            debug!("Token is valid, no refresh needed");
            let client = AuthenticatedClient::new(tokens.access_token.clone());
            *cached = Some(tokens);
            return Ok(client);
        }

        info!("Token expired or expiring soon, refreshing");

        match self.refresh(&tokens).await {
            Ok(refreshed) => {
                let client = AuthenticatedClient::new(refreshed.access_token.clone());
                *cached = Some(refreshed);
                Ok(client)
            }
            Err(e) => {
                error!(error = %e, "Token refresh failed");
                self.report_failure(&e);
                *cached = Some(tokens);
                Err(e)
            }
        }
    }
}

/// Credential provider for a fixed, externally managed token
pub struct StaticCredentialProvider {
    client: AuthenticatedClient,
}

impl StaticCredentialProvider {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: AuthenticatedClient::new(access_token),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn get_client(&self) -> Result<AuthenticatedClient> {
        Ok(self.client.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_client_header() {
        let client = AuthenticatedClient::new("ya29.token");
        assert_eq!(client.authorization_header(), "Bearer ya29.token");
        assert_eq!(client.access_token(), "ya29.token");
    }

    #[test]
    fn test_authenticated_client_debug_redacts() {
        let client = AuthenticatedClient::new("ya29.token");
        assert!(!format!("{:?}", client).contains("ya29"));
    }

    #[tokio::test]
    async fn test_static_provider_returns_fixed_token() {
        let provider = StaticCredentialProvider::new("fixed");
        assert_eq!(provider.get_client().await.unwrap().access_token(), "fixed");
        assert_eq!(provider.get_client().await.unwrap().access_token(), "fixed");
    }
}
