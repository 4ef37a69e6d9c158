//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host.
//!
//! ## Overview
//!
//! This crate defines the contract between the upload core and the concrete
//! I/O it runs on. Each trait represents a capability that the core requires but
//! that the host provides.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async single-attempt HTTP operations
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Staging, ranged reads, cleanup
//! - [`VideoUploadApi`](upload::VideoUploadApi) - Resumable upload wire protocol
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations
//! should keep the distinction between "no response" (`Transport`) and "error
//! response" (`Http { status, .. }`); the retry policy depends on it.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.

pub mod error;
pub mod http;
pub mod storage;
pub mod upload;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{FileMetadata, FileSystemAccess};
pub use upload::{
    ChunkResponse, InitiateUpload, UploadChunk, UploadTarget, UploadedVideo, VideoInsertBody,
    VideoSnippet, VideoStatus, VideoUploadApi,
};
