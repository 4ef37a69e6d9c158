//! # Authentication Module
//!
//! Credential supply for the upload engine.
//!
//! ## Overview
//!
//! The interactive OAuth consent flow happens elsewhere. This crate starts from
//! an already-granted token set and keeps it usable: it persists the tokens,
//! refreshes the access token before it expires and hands the engine a
//! ready-to-use bearer credential.
//!
//! ## Features
//!
//! - [`CredentialProvider`] seam consumed by the upload engine
//! - Automatic token refresh with a 5-minute expiry buffer
//! - Refresh serialized across concurrent uploads
//! - Token persistence through [`TokenStore`]
//! - Auth state event emission

pub mod error;
pub mod oauth;
pub mod provider;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use oauth::{OAuthClient, OAuthConfig};
pub use provider::{
    AuthenticatedClient, CredentialProvider, OAuthCredentialProvider, StaticCredentialProvider,
};
pub use token_store::{FileTokenStore, TokenStore};
pub use types::OAuthTokens;
