use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// Network-level failure: connect, timeout, reset, truncated body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The remote answered successfully but the payload could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            BridgeError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, BridgeError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessor() {
        let error = BridgeError::Http {
            status: 503,
            message: "backend unavailable".to_string(),
        };
        assert_eq!(error.status(), Some(503));
        assert!(!error.is_transport());

        let error = BridgeError::Transport("connection reset".to_string());
        assert_eq!(error.status(), None);
        assert!(error.is_transport());
    }

    #[test]
    fn test_display() {
        let error = BridgeError::Http {
            status: 403,
            message: "quotaExceeded".to_string(),
        };
        assert_eq!(error.to_string(), "HTTP 403: quotaExceeded");
    }
}
