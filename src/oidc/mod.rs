//! OpenID Connect integration
//!
//! Handles:
//! - Provider metadata discovery
//! - Authorization URL construction and code-for-token exchange
//! - ID-token verification and userinfo-based profile resolution

mod client;
mod id_token;
mod metadata;
mod profile;

pub use client::{OidcClient, TokenResponse};
pub use id_token::{IdTokenError, IdTokenVerifier};
pub use metadata::ProviderMetadata;
pub use profile::UserProfile;
