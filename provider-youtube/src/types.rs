//! YouTube API response types

use serde::Deserialize;

/// Error envelope returned by Google APIs
///
/// See: https://developers.google.com/youtube/v3/docs/errors
#[derive(Debug, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<GoogleErrorItem>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorItem {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl GoogleErrorResponse {
    /// `reason: message` of the first error item, falling back to the top-level message
    pub fn summary(&self) -> String {
        let reason = self.error.errors.first().and_then(|e| e.reason.as_deref());
        let message = self
            .error
            .message
            .as_deref()
            .or_else(|| self.error.errors.first().and_then(|e| e.message.as_deref()))
            .unwrap_or("unknown error");

        match reason {
            Some(reason) => format!("{}: {}", reason, message),
            None => message.to_string(),
        }
    }
}

/// Number of bytes the remote holds, from a `Range: bytes=0-<last>` header
///
/// Returns `None` when the value is not of that form.
pub fn acknowledged_bytes(range: &str) -> Option<u64> {
    let last = range.trim().strip_prefix("bytes=0-")?;
    last.parse::<u64>().ok()?.checked_add(1)
}
