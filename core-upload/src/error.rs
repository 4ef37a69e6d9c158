use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use std::fmt;
use thiserror::Error;

/// Classification of a single failed request, independent of the transport library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response was received (connection reset, timeout, DNS)
    Transport,
    /// The remote answered with a non-success status
    Status(u16),
    /// The remote answered with something that does not follow the protocol
    MalformedResponse,
    /// Credentials could not be obtained
    Auth,
    /// Reading or removing the local media failed
    Local,
}

/// Remote statuses treated as transient.
pub const RETRIABLE_STATUS_CODES: [u16; 4] = [500, 502, 503, 504];

impl ErrorKind {
    /// Whether a failure of this kind may succeed when repeated.
    pub fn is_retriable(&self) -> bool {
        match self {
            ErrorKind::Transport => true,
            ErrorKind::Status(status) => RETRIABLE_STATUS_CODES.contains(status),
            ErrorKind::MalformedResponse | ErrorKind::Auth | ErrorKind::Local => false,
        }
    }
}

impl From<&BridgeError> for ErrorKind {
    fn from(err: &BridgeError) -> Self {
        match err {
            BridgeError::Transport(_) => ErrorKind::Transport,
            BridgeError::Http { status, .. } => ErrorKind::Status(*status),
            BridgeError::InvalidResponse(_) => ErrorKind::MalformedResponse,
            BridgeError::Io(_) => ErrorKind::Local,
            BridgeError::NotAvailable(_) | BridgeError::OperationFailed(_) => {
                ErrorKind::MalformedResponse
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Status(status) => write!(f, "status {}", status),
            ErrorKind::MalformedResponse => write!(f, "malformed response"),
            ErrorKind::Auth => write!(f, "auth"),
            ErrorKind::Local => write!(f, "local"),
        }
    }
}

/// Terminal failure of one chunked upload session.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Unexpected response from upload endpoint: {0}")]
    UnexpectedResponse(String),

    #[error("Giving up after {retries} retries, last error ({kind}): {last_error}")]
    MaxRetriesExceeded {
        retries: u32,
        kind: ErrorKind,
        last_error: String,
    },

    #[error("Upload rejected by remote ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Upload cancelled after {bytes_sent} bytes")]
    Cancelled { bytes_sent: u64 },

    #[error("Local file error: {0}")]
    LocalFile(String),
}

impl UploadError {
    /// Whether starting over later might succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            UploadError::MaxRetriesExceeded { .. } | UploadError::Cancelled { .. } => true,
            UploadError::Auth(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

/// Failure of the end-to-end workflow for one video resource.
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("Resource {resource_id} was already uploaded as {video_id}")]
    AlreadyUploaded {
        resource_id: String,
        video_id: String,
    },

    #[error("Resource {resource_id} has no usable local file{}", .path.as_ref().map(|p| format!(" ({})", p)).unwrap_or_default())]
    MissingFile {
        resource_id: String,
        path: Option<String>,
    },

    #[error("Resource {resource_id} no longer exists")]
    ResourceDestroyed { resource_id: String },

    #[error("Invalid video metadata: {0}")]
    InvalidMetadata(String),

    #[error("Upload of resource {resource_id} failed and the record was removed: {source}")]
    Upload {
        resource_id: String,
        #[source]
        source: UploadError,
    },

    #[error("Failed to stage video file: {0}")]
    Staging(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("Repository error: {0}")]
    Repository(String),
}

impl OrchestrationError {
    /// The session failure behind an `Upload` error.
    pub fn upload_error(&self) -> Option<&UploadError> {
        match self {
            OrchestrationError::Upload { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for OrchestrationError {
    fn from(err: sqlx::Error) -> Self {
        OrchestrationError::Repository(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        assert!(ErrorKind::Transport.is_retriable());
        for status in [500, 502, 503, 504] {
            assert!(ErrorKind::Status(status).is_retriable());
        }
        for status in [400, 401, 403, 404, 429, 501, 505] {
            assert!(!ErrorKind::Status(status).is_retriable());
        }
        assert!(!ErrorKind::MalformedResponse.is_retriable());
        assert!(!ErrorKind::Auth.is_retriable());
        assert!(!ErrorKind::Local.is_retriable());
    }

    #[test]
    fn test_bridge_error_classification() {
        assert_eq!(
            ErrorKind::from(&BridgeError::Transport("reset".into())),
            ErrorKind::Transport
        );
        assert_eq!(
            ErrorKind::from(&BridgeError::Http {
                status: 503,
                message: "unavailable".into()
            }),
            ErrorKind::Status(503)
        );
        assert_eq!(
            ErrorKind::from(&BridgeError::InvalidResponse("no id".into())),
            ErrorKind::MalformedResponse
        );
        assert_eq!(
            ErrorKind::from(&BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "gone"
            ))),
            ErrorKind::Local
        );
    }

    #[test]
    fn test_missing_file_display() {
        let err = OrchestrationError::MissingFile {
            resource_id: "r1".into(),
            path: Some("/tmp/v.mp4".into()),
        };
        assert_eq!(
            err.to_string(),
            "Resource r1 has no usable local file (/tmp/v.mp4)"
        );

        let err = OrchestrationError::MissingFile {
            resource_id: "r1".into(),
            path: None,
        };
        assert_eq!(err.to_string(), "Resource r1 has no usable local file");
    }

    #[test]
    fn test_recoverable_upload_errors() {
        assert!(UploadError::MaxRetriesExceeded {
            retries: 10,
            kind: ErrorKind::Transport,
            last_error: "reset".into()
        }
        .is_recoverable());
        assert!(!UploadError::RemoteRejected {
            status: 400,
            message: "bad".into()
        }
        .is_recoverable());
        assert!(!UploadError::Auth(AuthError::NotAuthenticated).is_recoverable());
    }
}
