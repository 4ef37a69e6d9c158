//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the upload core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions, the validated configuration and
//! the event broadcasting mechanism used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, UploadSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};
