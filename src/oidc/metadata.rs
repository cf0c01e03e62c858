//! OIDC provider metadata discovery
//!
//! Fetches the provider's discovery document
//! (`/.well-known/openid-configuration`) to learn its endpoint URLs.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;

/// OpenID Connect provider metadata (the subset this service uses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer URL, matched against the `iss` claim of ID tokens
    pub issuer: String,

    /// Authorization endpoint URL
    pub authorization_endpoint: String,

    /// Token endpoint URL
    pub token_endpoint: String,

    /// Userinfo endpoint (optional in the document)
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,

    /// JWKS URI for ID-token signature verification
    #[serde(default)]
    pub jwks_uri: Option<String>,
}

impl ProviderMetadata {
    /// Fetch and parse the discovery document.
    ///
    /// # Errors
    /// Returns an error if the document is unreachable or not valid JSON.
    pub async fn discover(client: &Client, discovery_url: &str) -> Result<Self, AppError> {
        debug!(url = %discovery_url, "Discovering OIDC provider metadata");

        let response = client
            .get(discovery_url)
            .send()
            .await
            .map_err(|e| AppError::Oidc(format!("failed to fetch provider metadata: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Oidc(format!(
                "provider metadata discovery failed: HTTP {}",
                response.status()
            )));
        }

        let metadata: Self = response
            .json()
            .await
            .map_err(|e| AppError::Oidc(format!("failed to parse provider metadata: {e}")))?;

        debug!(issuer = %metadata.issuer, "Discovered OIDC provider");
        Ok(metadata)
    }
}
