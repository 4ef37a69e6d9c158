use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated: no stored credentials")]
    NotAuthenticated,

    #[error("Access token expired and no refresh token is available")]
    NoRefreshToken,

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },

    #[error("Token storage unavailable: {0}")]
    TokenStorage(String),

    #[error("Stored tokens are corrupted: {reason}")]
    TokenCorrupted { reason: String },

    #[error("Invalid OAuth configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Whether a later attempt may succeed without user interaction.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::NetworkError(_) | AuthError::OperationTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
