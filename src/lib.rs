//! Workspace facade crate.
//!
//! Host applications can depend on `video-upload-workspace` and reach every
//! layer of the upload engine through one dependency. The `desktop-shims`
//! feature (on by default) wires the reqwest/tokio bridge implementations into
//! `CoreConfig`.

pub use core_auth as auth;
pub use core_runtime as runtime;
pub use core_upload as upload;
pub use provider_youtube as youtube;
