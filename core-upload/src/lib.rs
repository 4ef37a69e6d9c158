//! # Video Upload Engine
//!
//! Resumable, chunked upload of local video files with their metadata, plus
//! the lifecycle of the local record that tracks each video.
//!
//! ## Components
//!
//! - **Backoff Policy** (`backoff`): retry or give up, and how long to wait
//! - **Chunked Upload Session** (`session`): drives one resumable upload to its final response
//! - **Upload Orchestrator** (`orchestrator`): register, upload, clean up, roll back
//! - **Resource Lifecycle** (`resource`): `Pending → Uploading → Uploaded | Aborted`
//! - **Repository** (`repository`, `db`): SQLite persistence of video records
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_upload::{db, SqliteVideoRepository, UploadOrchestrator, VideoMetadata};
//!
//! let pool = db::create_pool(db::DatabaseConfig::new(&config.database_path)).await?;
//! let orchestrator = UploadOrchestrator::new(
//!     &config,
//!     Arc::new(youtube_client),
//!     Arc::new(SqliteVideoRepository::new(pool)),
//! )
//! .with_event_bus(event_bus);
//!
//! let mut video = orchestrator
//!     .register(VideoMetadata::new("Demo").with_tags(["a", "b"]), "demo.mp4", bytes)
//!     .await?;
//! let report = orchestrator.upload(&mut video, &credentials).await?;
//! println!("{}", report.url);
//! ```

pub mod backoff;
pub mod db;
pub mod error;
pub mod orchestrator;
pub mod repository;
pub mod resource;
pub mod session;

pub use backoff::{BackoffPolicy, RetryDecision};
pub use error::{ErrorKind, OrchestrationError, Result, UploadError};
pub use orchestrator::{
    Thumbnail, ThumbnailOutcome, UploadOptions, UploadOrchestrator, UploadReport,
};
pub use repository::{SqliteVideoRepository, VideoRepository};
pub use resource::{
    parse_tags, PrivacyStatus, ResourceId, ResourceState, VideoCategory, VideoMetadata,
    VideoResource,
};
pub use session::{ChunkedUploader, SessionOutcome, UploadSession};
