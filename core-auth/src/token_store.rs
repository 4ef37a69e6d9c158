//! Token Persistence
//!
//! The uploader keeps exactly one granted token set. It is read at startup and
//! rewritten after every successful refresh so a restarted process does not
//! need a new consent.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{FileTokenStore, OAuthTokens, TokenStore};
//! use std::sync::Arc;
//! # use bridge_traits::storage::FileSystemAccess;
//! # async fn example(fs: Arc<dyn FileSystemAccess>) -> core_auth::Result<()> {
//! let store = FileTokenStore::new(fs, "/var/lib/uploader/youtube_token.json");
//!
//! let tokens = OAuthTokens::new("access".to_string(), Some("refresh".to_string()), 3600);
//! store.save(&tokens).await?;
//! let loaded = store.load().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use async_trait::async_trait;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Storage for the uploader's OAuth token set
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns `None` when no tokens were ever stored.
    async fn load(&self) -> Result<Option<OAuthTokens>>;

    /// Overwrites any previously stored tokens.
    async fn save(&self, tokens: &OAuthTokens) -> Result<()>;

    /// Removes stored tokens; succeeds when nothing is stored.
    async fn clear(&self) -> Result<()>;
}

/// JSON file on the host file system
///
/// Token values are never logged. A file that no longer parses is deleted and
/// reported as [`AuthError::TokenCorrupted`], forcing a new consent.
#[derive(Clone)]
pub struct FileTokenStore {
    fs: Arc<dyn FileSystemAccess>,
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(fs: Arc<dyn FileSystemAccess>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<OAuthTokens>> {
        let exists = self
            .fs
            .exists(&self.path)
            .await
            .map_err(|e| AuthError::TokenStorage(e.to_string()))?;

        if !exists {
            debug!("No token file found");
            return Ok(None);
        }

        let data = self.fs.read_file(&self.path).await.map_err(|e| {
            warn!(error = %e, "Failed to read token file");
            AuthError::TokenStorage(e.to_string())
        })?;

        let tokens: OAuthTokens = match serde_json::from_slice(&data) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Failed to deserialize tokens, they may be corrupted");

                if let Err(delete_err) = self.fs.delete_file(&self.path).await {
                    warn!(error = %delete_err, "Failed to delete corrupted token file");
                }

                return Err(AuthError::TokenCorrupted {
                    reason: e.to_string(),
                });
            }
        };

        debug!(
            has_refresh_token = tokens.refresh_token.is_some(),
            expires_at = %tokens.expires_at,
            "Tokens loaded"
        );

        Ok(Some(tokens))
    }

    async fn save(&self, tokens: &OAuthTokens) -> Result<()> {
        let json = serde_json::to_vec(tokens).map_err(|e| {
            AuthError::TokenStorage(format!("Token serialization failed: {}", e))
        })?;

        self.fs
            .write_file(&self.path, Bytes::from(json))
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to write token file");
                AuthError::TokenStorage(e.to_string())
            })?;

        info!(
            has_refresh_token = tokens.refresh_token.is_some(),
            "Tokens stored"
        );

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let exists = self
            .fs
            .exists(&self.path)
            .await
            .map_err(|e| AuthError::TokenStorage(e.to_string()))?;

        if exists {
            self.fs
                .delete_file(&self.path)
                .await
                .map_err(|e| AuthError::TokenStorage(e.to_string()))?;
            info!("Tokens deleted");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;

    fn store(dir: &tempfile::TempDir) -> FileTokenStore {
        let fs = Arc::new(TokioFileSystem::with_data_directory(dir.path().to_path_buf()));
        FileTokenStore::new(fs, dir.path().join("auth").join("youtube_token.json"))
    }

    #[tokio::test]
    async fn test_load_without_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(&dir).load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let tokens = OAuthTokens::new("access".to_string(), Some("refresh".to_string()), 3600);

        store.save(&tokens).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded, tokens);
    }

    #[tokio::test]
    async fn test_overwrite_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store
            .save(&OAuthTokens::new("first".to_string(), None, 3600))
            .await
            .unwrap();
        store
            .save(&OAuthTokens::new("second".to_string(), None, 3600))
            .await
            .unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "second");
    }

    #[tokio::test]
    async fn test_corrupted_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(dir.path().join("auth")).unwrap();
        std::fs::write(store.path(), b"not json").unwrap();

        let result = store.load().await;
        assert!(matches!(result, Err(AuthError::TokenCorrupted { .. })));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store.clear().await.unwrap();
        store
            .save(&OAuthTokens::new("a".to_string(), None, 60))
            .await
            .unwrap();
        store.clear().await.unwrap();

        assert!(store.load().await.unwrap().is_none());
    }
}
