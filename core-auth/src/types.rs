use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Refresh tokens this long before they actually expire.
pub const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

/// OAuth 2.0 token set.
///
/// Contains the access token, refresh token, and expiration time
/// for an authorized uploader account.
///
/// # Security
///
/// Tokens should be stored securely and never logged. The `Debug` implementation
/// redacts sensitive information.
///
/// # Examples
///
/// ```
/// use core_auth::OAuthTokens;
///
/// let tokens = OAuthTokens::new(
///     "ya29.a0...".to_string(),
///     Some("1//0g...".to_string()),
///     3600,
/// );
///
/// assert!(!tokens.is_expired());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used for API requests
    pub access_token: String,
    /// The refresh token used to obtain new access tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC)
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Create a new token set expiring `expires_in` seconds from now
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }

    /// Check if the access token is expired or will expire within the default buffer
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(TOKEN_REFRESH_BUFFER_SECS)
    }

    /// Check if the access token is expired with a custom buffer
    ///
    /// # Arguments
    ///
    /// * `buffer_seconds` - Number of seconds before expiration to consider expired
    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        Utc::now() >= self.expires_at - Duration::seconds(buffer_seconds)
    }

    /// Get the time remaining until token expiration
    ///
    /// Returns `None` if the token is already expired.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        let now = Utc::now();
        if now >= self.expires_at {
            None
        } else {
            Some(self.expires_at - now)
        }
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens_expiring_in(seconds: i64) -> OAuthTokens {
        OAuthTokens {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Utc::now() + Duration::seconds(seconds),
        }
    }

    #[test]
    fn test_fresh_token_is_not_expired() {
        let tokens = tokens_expiring_in(3600);
        assert!(!tokens.is_expired());
        assert!(tokens.time_until_expiry().is_some());
    }

    #[test]
    fn test_token_inside_buffer_counts_as_expired() {
        let tokens = tokens_expiring_in(120);
        assert!(tokens.is_expired());
        assert!(!tokens.is_expired_with_buffer(60));
    }

    #[test]
    fn test_past_token_has_no_time_left() {
        let tokens = tokens_expiring_in(-10);
        assert!(tokens.is_expired_with_buffer(0));
        assert!(tokens.time_until_expiry().is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let tokens = OAuthTokens::new(
            "ya29.secret".to_string(),
            Some("1//refresh-secret".to_string()),
            3600,
        );
        let debug = format!("{:?}", tokens);

        assert!(!debug.contains("ya29.secret"));
        assert!(!debug.contains("refresh-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_missing_refresh_token_deserializes() {
        let json = r#"{"access_token":"a","expires_at":"2030-01-01T00:00:00Z"}"#;
        let tokens: OAuthTokens = serde_json::from_str(json).unwrap();
        assert_eq!(tokens.refresh_token, None);
    }
}
