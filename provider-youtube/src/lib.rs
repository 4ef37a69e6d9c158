//! # YouTube Provider
//!
//! Implements the `VideoUploadApi` bridge for the YouTube Data API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Resumable upload session initiation (`videos.insert` with `uploadType=resumable`)
//! - `Content-Range` chunk transfers with `308 Resume Incomplete` handling
//! - Upload status queries for resuming after a failure
//! - Custom thumbnail upload (`thumbnails.set`)
//!
//! The client performs one HTTP attempt per call. Retry and backoff are driven
//! by the caller, which sees transport failures and HTTP statuses as distinct
//! `BridgeError` variants.

pub mod client;
pub mod error;
pub mod types;

pub use client::YouTubeClient;
pub use error::{Result, YouTubeError};
