//! Error types for the YouTube provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// YouTube Data API errors
#[derive(Error, Debug)]
pub enum YouTubeError {
    /// API request returned a non-success status
    #[error("YouTube API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Session initiation succeeded but carried no `Location` header
    #[error("Resumable session response has no Location header")]
    MissingSessionUri,

    /// A `308 Resume Incomplete` carried a `Range` header we cannot read
    #[error("Invalid Range header: {0}")]
    InvalidRange(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for YouTube operations
pub type Result<T> = std::result::Result<T, YouTubeError>;

impl From<YouTubeError> for BridgeError {
    fn from(error: YouTubeError) -> Self {
        match error {
            YouTubeError::ApiError {
                status_code,
                message,
            } => BridgeError::Http {
                status: status_code,
                message,
            },
            YouTubeError::MissingSessionUri => {
                BridgeError::InvalidResponse("missing Location header".to_string())
            }
            YouTubeError::InvalidRange(value) => {
                BridgeError::InvalidResponse(format!("invalid Range header: {}", value))
            }
            YouTubeError::ParseError(msg) => BridgeError::InvalidResponse(msg),
            YouTubeError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = YouTubeError::ApiError {
            status_code: 403,
            message: "quotaExceeded".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "YouTube API error (status 403): quotaExceeded"
        );
    }

    #[test]
    fn test_api_error_keeps_status() {
        let bridge_error: BridgeError = YouTubeError::ApiError {
            status_code: 503,
            message: "backendError".to_string(),
        }
        .into();

        assert_eq!(bridge_error.status(), Some(503));
    }

    #[test]
    fn test_protocol_errors_become_invalid_response() {
        let bridge_error: BridgeError = YouTubeError::MissingSessionUri.into();
        assert!(matches!(bridge_error, BridgeError::InvalidResponse(_)));

        let bridge_error: BridgeError = YouTubeError::ParseError("eof".to_string()).into();
        assert!(matches!(bridge_error, BridgeError::InvalidResponse(_)));
    }

    #[test]
    fn test_transport_error_passes_through() {
        let bridge_error: BridgeError =
            YouTubeError::BridgeError(BridgeError::Transport("reset".to_string())).into();
        assert!(bridge_error.is_transport());
    }
}
