//! # Upload Orchestrator
//!
//! Owns the end-to-end workflow for one video resource.
//!
//! ## Workflow
//!
//! ```text
//! register ──> Pending ──upload──> Uploading ──session ok──> Uploaded
//!                                      │                       │
//!                                      │                       ├─ delete staged file (warn on failure)
//!                                      │                       └─ set thumbnail (reported, never reverts)
//!                                      │
//!                                      └──session failed──> Aborted: record deleted, staged file removed
//! ```
//!
//! A failed upload never leaves a record behind: a row with neither a remote
//! video nor a usable source file is meaningless.

use crate::error::{OrchestrationError, Result, UploadError};
use crate::repository::VideoRepository;
use crate::resource::{ResourceId, VideoMetadata, VideoResource};
use crate::session::{ChunkedUploader, SessionOutcome};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::upload::VideoUploadApi;
use bytes::Bytes;
use core_auth::CredentialProvider;
use core_runtime::config::{CoreConfig, UploadSettings};
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use core_runtime::logging::strip_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Image to attach once the video exists
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub data: Bytes,
    /// e.g. `image/png`
    pub content_type: String,
}

impl Thumbnail {
    pub fn new(data: Bytes, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }
}

/// Per-call options of [`UploadOrchestrator::upload_with`]
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub thumbnail: Option<Thumbnail>,
    pub cancellation: CancellationToken,
}

impl UploadOptions {
    pub fn with_thumbnail(mut self, thumbnail: Thumbnail) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// What happened to the thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    NotRequested,
    Set,
    Failed(String),
}

/// Summary of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub resource_id: ResourceId,
    pub video_id: String,
    pub url: String,
    pub retries: u32,
    pub bytes_sent: u64,
    pub thumbnail: ThumbnailOutcome,
    /// Set when the staged file could not be removed
    pub cleanup_warning: Option<String>,
}

/// Coordinates registration, upload, cleanup and rollback
pub struct UploadOrchestrator {
    api: Arc<dyn VideoUploadApi>,
    repository: Arc<dyn VideoRepository>,
    file_system: Arc<dyn FileSystemAccess>,
    uploader: ChunkedUploader,
    staging_dir: PathBuf,
    event_bus: Option<EventBus>,
}

impl UploadOrchestrator {
    /// Build an orchestrator from the core configuration.
    pub fn new(
        config: &CoreConfig,
        api: Arc<dyn VideoUploadApi>,
        repository: Arc<dyn VideoRepository>,
    ) -> Self {
        Self::with_parts(
            api,
            repository,
            Arc::clone(&config.file_system),
            config.staging_dir.clone(),
            &config.upload,
        )
    }

    pub fn with_parts(
        api: Arc<dyn VideoUploadApi>,
        repository: Arc<dyn VideoRepository>,
        file_system: Arc<dyn FileSystemAccess>,
        staging_dir: impl Into<PathBuf>,
        settings: &UploadSettings,
    ) -> Self {
        let uploader = ChunkedUploader::new(Arc::clone(&api), Arc::clone(&file_system), settings);
        Self {
            api,
            repository,
            file_system,
            uploader,
            staging_dir: staging_dir.into(),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.uploader = self.uploader.with_event_bus(event_bus.clone());
        self.event_bus = Some(event_bus);
        self
    }

    /// Replace the session runner (e.g. to shorten the backoff unit).
    pub fn with_uploader(mut self, uploader: ChunkedUploader) -> Self {
        self.uploader = match &self.event_bus {
            Some(bus) => uploader.with_event_bus(bus.clone()),
            None => uploader,
        };
        self
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Upload(event)).ok();
        }
    }

    /// Stage the media in the staging area and create a pending record.
    ///
    /// # Errors
    ///
    /// - `InvalidMetadata` if the metadata breaks a remote limit or `data` is empty
    /// - `Staging` if the file cannot be written
    /// - `Repository` if the record cannot be stored; the staged file is removed
    #[instrument(skip(self, metadata, data), fields(size = data.len()))]
    pub async fn register(
        &self,
        metadata: VideoMetadata,
        file_name: &str,
        data: Bytes,
    ) -> Result<VideoResource> {
        metadata.validate()?;
        if data.is_empty() {
            return Err(OrchestrationError::InvalidMetadata(
                "video file is empty".to_string(),
            ));
        }

        let id = ResourceId::new();
        let path = self.staging_dir.join(staged_file_name(&id, file_name));

        self.file_system
            .write_file(&path, data)
            .await
            .map_err(|e| OrchestrationError::Staging(format!("{}: {}", path.display(), e)))?;

        let resource = VideoResource::with_id(id, metadata, &path);

        if let Err(e) = self.repository.insert(&resource).await {
            error!(error = %e, "Failed to store resource, removing staged file");
            self.remove_local_file(&path).await;
            return Err(e);
        }

        info!(
            resource_id = %resource.id,
            file = strip_path(&path.to_string_lossy()),
            "Video registered"
        );
        Ok(resource)
    }

    /// Upload a pending resource with default options.
    pub async fn upload(
        &self,
        resource: &mut VideoResource,
        credentials: &dyn CredentialProvider,
    ) -> Result<UploadReport> {
        self.upload_with(resource, credentials, UploadOptions::default())
            .await
    }

    /// Upload a pending resource.
    ///
    /// On success the resource is `Uploaded` with its remote id set and no local
    /// file. On failure it is `Aborted`, its record is deleted and the original
    /// session error is returned inside `OrchestrationError::Upload`.
    ///
    /// Precondition failures (`AlreadyUploaded`, `ResourceDestroyed`,
    /// `MissingFile`, `InvalidMetadata`) leave the resource untouched and make
    /// no network call.
    #[instrument(skip(self, resource, credentials, options), fields(resource_id = %resource.id))]
    pub async fn upload_with(
        &self,
        resource: &mut VideoResource,
        credentials: &dyn CredentialProvider,
        options: UploadOptions,
    ) -> Result<UploadReport> {
        let file = self.check_preconditions(resource).await?;

        let mut uploading = resource.clone();
        uploading.start_upload()?;
        self.repository.update(&uploading).await?;
        *resource = uploading;

        let outcome = match self
            .uploader
            .run(resource, &file, credentials, &options.cancellation)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.roll_back(resource, e).await),
        };

        self.complete(resource, outcome, credentials, options.thumbnail)
            .await
    }

    async fn check_preconditions(&self, resource: &VideoResource) -> Result<PathBuf> {
        let resource_id = resource.id.to_string();

        if let Some(video_id) = &resource.video_id {
            return Err(OrchestrationError::AlreadyUploaded {
                resource_id,
                video_id: video_id.clone(),
            });
        }

        if resource.state.is_terminal() {
            return Err(OrchestrationError::ResourceDestroyed { resource_id });
        }

        let file = resource
            .local_file
            .clone()
            .ok_or_else(|| OrchestrationError::MissingFile {
                resource_id: resource_id.clone(),
                path: None,
            })?;

        // An unreadable staging area counts as a missing file
        let exists = self.file_system.exists(&file).await.unwrap_or(false);
        if !exists {
            return Err(OrchestrationError::MissingFile {
                resource_id,
                path: Some(file.display().to_string()),
            });
        }

        resource.metadata.validate()?;

        Ok(file)
    }

    async fn complete(
        &self,
        resource: &mut VideoResource,
        outcome: SessionOutcome,
        credentials: &dyn CredentialProvider,
        thumbnail: Option<Thumbnail>,
    ) -> Result<UploadReport> {
        let staged = resource.complete(outcome.video_id.clone())?;

        if let Err(e) = self.repository.update(resource).await {
            error!(
                video_id = %outcome.video_id,
                error = %e,
                "Video uploaded but the record could not be updated"
            );
            return Err(e);
        }

        let cleanup_warning = match &staged {
            Some(path) => self.remove_local_file(path).await,
            None => None,
        };

        let thumbnail = match thumbnail {
            Some(thumbnail) => {
                self.set_thumbnail(&outcome.video_id, thumbnail, credentials)
                    .await
            }
            None => ThumbnailOutcome::NotRequested,
        };

        self.emit(UploadEvent::Completed {
            resource_id: resource.id.to_string(),
            video_id: outcome.video_id.clone(),
            retries: outcome.retries,
        });

        let url = resource.remote_url().unwrap_or_default();
        info!(video_id = %outcome.video_id, url = %url, "Video uploaded");

        Ok(UploadReport {
            resource_id: resource.id,
            video_id: outcome.video_id,
            url,
            retries: outcome.retries,
            bytes_sent: outcome.bytes_sent,
            thumbnail,
            cleanup_warning,
        })
    }

    async fn set_thumbnail(
        &self,
        video_id: &str,
        thumbnail: Thumbnail,
        credentials: &dyn CredentialProvider,
    ) -> ThumbnailOutcome {
        let result = match credentials.get_client().await {
            Ok(client) => self
                .api
                .set_thumbnail(
                    client.access_token(),
                    video_id,
                    thumbnail.data,
                    &thumbnail.content_type,
                )
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(()) => ThumbnailOutcome::Set,
            Err(message) => {
                warn!(video_id = %video_id, error = %message, "Failed to set thumbnail");
                self.emit(UploadEvent::ThumbnailFailed {
                    video_id: video_id.to_string(),
                    message: message.clone(),
                });
                ThumbnailOutcome::Failed(message)
            }
        }
    }

    /// Abort the resource, delete its record and staged file.
    async fn roll_back(&self, resource: &mut VideoResource, err: UploadError) -> OrchestrationError {
        error!(error = %err, "Upload failed, rolling back");

        let staged = match resource.abort() {
            Ok(staged) => staged,
            Err(e) => {
                warn!(error = %e, "Unexpected state during rollback");
                resource.local_file.take()
            }
        };

        if let Err(e) = self.repository.delete(&resource.id).await {
            warn!(error = %e, "Failed to delete aborted resource record");
        }

        if let Some(path) = &staged {
            self.remove_local_file(path).await;
        }

        if !matches!(err, UploadError::Cancelled { .. }) {
            self.emit(UploadEvent::Failed {
                resource_id: resource.id.to_string(),
                message: err.to_string(),
                recoverable: err.is_recoverable(),
            });
        }

        OrchestrationError::Upload {
            resource_id: resource.id.to_string(),
            source: err,
        }
    }

    /// Remove a staged file, returning a warning instead of failing.
    async fn remove_local_file(&self, path: &Path) -> Option<String> {
        match self.file_system.delete_file(path).await {
            Ok(()) => None,
            Err(e) => {
                let message = format!("failed to delete {}: {}", path.display(), e);
                warn!(
                    file = strip_path(&path.to_string_lossy()),
                    error = %e,
                    "Failed to delete staged file"
                );
                Some(message)
            }
        }
    }
}

/// `<resource id>_<base name>`, never escaping the staging directory
fn staged_file_name(id: &ResourceId, file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("video");
    format!("{}_{}", id, base)
}
