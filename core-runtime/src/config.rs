//! # Core Configuration Module
//!
//! Provides configuration management for the upload core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the bridges and settings the upload engine needs. It
//! enforces fail-fast validation so a bad chunk size or a missing bridge is
//! reported at startup rather than halfway through an upload.
//!
//! ## Bridges (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//! - `FileSystemAccess` - Staging area I/O (desktop default: tokio fs)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults are
//! injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, UploadSettings};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/var/lib/uploader/videos.db")
//!     .staging_dir("/var/lib/uploader/youtube/videos")
//!     .upload_settings(UploadSettings::default().with_chunk_size(Some(16 * 1024 * 1024)))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/videos.db")
//!     .build()
//!     .expect("Should fail - missing staging directory");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Granularity the resumable protocol requires for every non-final chunk.
pub const CHUNK_ALIGNMENT: u64 = 256 * 1024;

/// Default chunk size (8 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 32 * CHUNK_ALIGNMENT;

/// Default ceiling on retriable failures per upload.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Largest accepted retry ceiling; `2^attempt` units must stay representable.
const MAX_RETRY_CEILING: u32 = 32;

pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/youtube/v3";

/// Tunables of the chunked upload engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    /// Bytes per chunk; `None` sends the whole remainder in one request.
    pub chunk_size: Option<u64>,
    /// Retriable failures tolerated before giving up.
    pub max_retries: u32,
    /// Time unit of the exponential backoff (`[0, 2^attempt)` units).
    pub backoff_unit: Duration,
    /// Timeout of a single HTTP request.
    pub request_timeout: Duration,
    /// Root of the media upload endpoints.
    pub upload_base_url: String,
    /// MIME type announced in `X-Upload-Content-Type`.
    pub media_content_type: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            chunk_size: Some(DEFAULT_CHUNK_SIZE),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: Duration::from_secs(1),
            request_timeout: Duration::from_secs(300),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
            media_content_type: "video/*".to_string(),
        }
    }
}

impl UploadSettings {
    pub fn with_chunk_size(mut self, chunk_size: Option<u64>) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Point uploads at another host (e.g. a local test server).
    pub fn with_upload_base_url(mut self, upload_base_url: impl Into<String>) -> Self {
        self.upload_base_url = upload_base_url.into();
        self
    }

    pub fn with_media_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.media_content_type = content_type.into();
        self
    }

    /// Validates the settings and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.chunk_size {
            if size == 0 || size % CHUNK_ALIGNMENT != 0 {
                return Err(Error::Config(format!(
                    "Chunk size must be a positive multiple of {} bytes (256 KiB), got {}. \
                     Use None to upload the file in a single request.",
                    CHUNK_ALIGNMENT, size
                )));
            }
        }

        if self.max_retries > MAX_RETRY_CEILING {
            return Err(Error::Config(format!(
                "Max retries must not exceed {}, got {}",
                MAX_RETRY_CEILING, self.max_retries
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        let url = &self.upload_base_url;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(Error::Config(format!(
                "Upload base URL must be an http(s) URL, got '{}'",
                url
            )));
        }

        if self.media_content_type.trim().is_empty() {
            return Err(Error::Config(
                "Media content type cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Core configuration for the upload engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Directory holding source files until their upload succeeds
    pub staging_dir: PathBuf,

    /// Upload engine tunables
    pub upload: UploadSettings,

    /// HTTP client for API requests
    pub http_client: Arc<dyn HttpClient>,

    /// File system access abstraction
    pub file_system: Arc<dyn FileSystemAccess>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("staging_dir", &self.staging_dir)
            .field("upload", &self.upload)
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Staging directory is not empty
    /// - Upload settings are consistent
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.staging_dir.as_os_str().is_empty() {
            return Err(Error::Config(
                "Staging directory cannot be empty".to_string(),
            ));
        }

        self.upload.validate()
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(settings: &UploadSettings) -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::with_timeout(settings.request_timeout)
        .map_err(|e| Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: format!("Default reqwest client could not be created: {}", e),
        })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_settings: &UploadSettings) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for API requests. \
                 Desktop: enable the 'desktop-shims' feature to use the default reqwest client. \
                 Other hosts: inject an implementation with .http_client()."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(staging_dir: &std::path::Path) -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::with_data_directory(
        staging_dir.to_path_buf(),
    )))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(
    _staging_dir: &std::path::Path,
) -> Result<Arc<dyn FileSystemAccess>> {
    Err(Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required for the staging area. \
                 Desktop: enable the 'desktop-shims' feature to use the default tokio file system. \
                 Other hosts: inject an implementation with .file_system()."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    staging_dir: Option<PathBuf>,
    upload: Option<UploadSettings>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl CoreConfigBuilder {
    /// Sets the database file path (required).
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the staging directory for source files (required).
    pub fn staging_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.staging_dir = Some(path.into());
        self
    }

    /// Overrides the default upload settings.
    pub fn upload_settings(mut self, settings: UploadSettings) -> Self {
        self.upload = Some(settings);
        self
    }

    /// Sets the HTTP client implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if a required path is missing, a bridge is missing
    /// and no desktop default is available, or a setting is invalid.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let staging_dir = self.staging_dir.ok_or_else(|| {
            Error::Config(
                "Staging directory is required. Use .staging_dir() to set it.".to_string(),
            )
        })?;

        let upload = self.upload.unwrap_or_default();
        upload.validate()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(&upload)?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system(&staging_dir)?,
        };

        let config = CoreConfig {
            database_path,
            staging_dir,
            upload,
            http_client,
            file_system,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{FileMetadata, HttpRequest, HttpResponse};
    use bytes::Bytes;
    use std::path::Path;

    struct NullHttpClient;

    #[async_trait]
    impl HttpClient for NullHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            unimplemented!("not called by configuration tests")
        }
    }

    struct NullFileSystem;

    #[async_trait]
    impl FileSystemAccess for NullFileSystem {
        async fn get_data_directory(&self) -> BridgeResult<PathBuf> {
            unimplemented!()
        }
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            unimplemented!()
        }
        async fn metadata(&self, _path: &Path) -> BridgeResult<FileMetadata> {
            unimplemented!()
        }
        async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            unimplemented!()
        }
        async fn read_file(&self, _path: &Path) -> BridgeResult<Bytes> {
            unimplemented!()
        }
        async fn read_range(&self, _path: &Path, _offset: u64, _len: u64) -> BridgeResult<Bytes> {
            unimplemented!()
        }
        async fn write_file(&self, _path: &Path, _data: Bytes) -> BridgeResult<()> {
            unimplemented!()
        }
        async fn delete_file(&self, _path: &Path) -> BridgeResult<()> {
            unimplemented!()
        }
    }

    fn builder_with_bridges() -> CoreConfigBuilder {
        CoreConfig::builder()
            .http_client(Arc::new(NullHttpClient))
            .file_system(Arc::new(NullFileSystem))
    }

    #[test]
    fn test_builder_requires_database_path() {
        let result = builder_with_bridges().staging_dir("/tmp/staging").build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Database path")));
    }

    #[test]
    fn test_builder_requires_staging_dir() {
        let result = builder_with_bridges().database_path("/tmp/videos.db").build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Staging directory")));
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = builder_with_bridges()
            .database_path("/tmp/videos.db")
            .staging_dir("/tmp/staging")
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/videos.db"));
        assert_eq!(config.upload, UploadSettings::default());
        assert_eq!(config.upload.chunk_size, Some(8 * 1024 * 1024));
        assert_eq!(config.upload.max_retries, 10);
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_client_is_capability_error() {
        let result = CoreConfig::builder()
            .database_path("/tmp/videos.db")
            .staging_dir("/tmp/staging")
            .file_system(Arc::new(NullFileSystem))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { capability, .. }) if capability == "HttpClient"
        ));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder()
            .database_path("/tmp/videos.db")
            .staging_dir("/tmp/staging")
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_chunk_size_must_be_aligned() {
        let settings = UploadSettings::default().with_chunk_size(Some(1000));
        assert!(matches!(settings.validate(), Err(Error::Config(_))));

        let settings = UploadSettings::default().with_chunk_size(Some(0));
        assert!(settings.validate().is_err());

        let settings = UploadSettings::default().with_chunk_size(Some(3 * CHUNK_ALIGNMENT));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_single_request_upload_is_valid() {
        let settings = UploadSettings::default().with_chunk_size(None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_rejects_excessive_retry_ceiling() {
        let settings = UploadSettings::default().with_max_retries(64);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let settings = UploadSettings::default().with_upload_base_url("ftp://example.com");
        assert!(matches!(settings.validate(), Err(Error::Config(msg)) if msg.contains("Upload base URL")));
    }

    #[test]
    fn test_invalid_settings_fail_build() {
        let result = builder_with_bridges()
            .database_path("/tmp/videos.db")
            .staging_dir("/tmp/staging")
            .upload_settings(UploadSettings::default().with_request_timeout(Duration::ZERO))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = builder_with_bridges()
            .database_path("/tmp/videos.db")
            .staging_dir("/tmp/staging")
            .build()
            .unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("HttpClient { ... }"));
        assert!(debug.contains("/tmp/staging"));
    }
}
