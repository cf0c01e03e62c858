//! OIDC client
//!
//! Wraps the authorization-code flow against the configured provider:
//! metadata discovery, authorization URL construction, code-for-token
//! exchange, and profile resolution.

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::auth::state::LoginState;
use crate::config::GoogleOAuthConfig;
use crate::error::AppError;
use crate::metrics::PROFILE_RESOLUTIONS_TOTAL;

use super::id_token::IdTokenVerifier;
use super::metadata::ProviderMetadata;
use super::profile::UserProfile;

/// Provider token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer credential for the userinfo endpoint. Absent when the
    /// provider rejected the exchange without an HTTP error.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Signed identity assertion, when `openid` scope was granted
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// OIDC client for the configured provider
pub struct OidcClient {
    http: Client,
    config: GoogleOAuthConfig,
    /// Discovery document, fetched on first use and kept for the process
    /// lifetime
    metadata: RwLock<Option<ProviderMetadata>>,
    verifier: IdTokenVerifier,
}

impl OidcClient {
    pub fn new(config: GoogleOAuthConfig, http: Client) -> Self {
        Self {
            verifier: IdTokenVerifier::new(http.clone()),
            http,
            config,
            metadata: RwLock::new(None),
        }
    }

    /// Provider metadata, discovering it on first call.
    ///
    /// # Errors
    /// Returns an error if the discovery document cannot be fetched.
    pub async fn metadata(&self) -> Result<ProviderMetadata, AppError> {
        {
            let cached = self.metadata.read().await;
            if let Some(ref metadata) = *cached {
                return Ok(metadata.clone());
            }
        }

        let discovered = ProviderMetadata::discover(&self.http, &self.config.discovery_url).await?;

        let mut cached = self.metadata.write().await;
        if cached.is_none() {
            info!(issuer = %discovered.issuer, "OIDC provider metadata cached");
            *cached = Some(discovered.clone());
        }

        Ok(discovered)
    }

    /// Build the provider authorization URL for one login attempt.
    ///
    /// # Errors
    /// Returns an error if discovery fails or the advertised authorization
    /// endpoint is not a valid URL.
    pub async fn authorization_url(
        &self,
        redirect_uri: &str,
        login: &LoginState,
    ) -> Result<Url, AppError> {
        let metadata = self.metadata().await?;

        let mut auth_url = Url::parse(&metadata.authorization_endpoint)
            .map_err(|e| AppError::Oidc(format!("invalid authorization endpoint: {e}")))?;

        {
            let mut params = auth_url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &self.config.client_id);
            params.append_pair("redirect_uri", redirect_uri);
            params.append_pair("scope", &self.config.scopes);
            params.append_pair("state", &login.state);
            params.append_pair("nonce", &login.nonce);
        }

        Ok(auth_url)
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    /// Returns an error if the token endpoint is unreachable, responds with
    /// a non-success status, or returns an unparseable body.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let metadata = self.metadata().await?;

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ];

        let response = self
            .http
            .post(&metadata.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Oidc(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Oidc(format!(
                "token exchange failed: HTTP {status}"
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Oidc(format!("failed to parse token response: {e}")))?;

        debug!(has_id_token = tokens.id_token.is_some(), "Authorization code exchanged");
        Ok(tokens)
    }

    /// Fetch profile claims from the userinfo endpoint with the access
    /// token as a bearer credential.
    ///
    /// # Errors
    /// Returns an error on network failure or any non-200 response.
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<UserProfile, AppError> {
        let userinfo_url = self
            .metadata()
            .await
            .ok()
            .and_then(|m| m.userinfo_endpoint)
            .unwrap_or_else(|| self.config.userinfo_url.clone());

        let response = self
            .http
            .get(&userinfo_url)
            .bearer_auth(access_token)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| AppError::Oidc(format!("userinfo request failed: {e}")))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(AppError::Oidc(format!(
                "userinfo returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Oidc(format!("failed to parse userinfo response: {e}")))
    }

    /// Resolve the user's profile from an exchange result.
    ///
    /// Two-step strategy: verify the ID token locally when one is present
    /// and its nonce matches this login attempt; otherwise, or when that
    /// verification fails for any reason, call the userinfo endpoint with
    /// the access token. Resolution fails only when both paths fail.
    pub async fn resolve_profile(
        &self,
        tokens: &TokenResponse,
        nonce: &str,
    ) -> Result<UserProfile, AppError> {
        if let Some(ref id_token) = tokens.id_token {
            let metadata = self.metadata().await?;
            match self
                .verifier
                .verify(id_token, &metadata, &self.config.client_id, nonce)
                .await
            {
                Ok(profile) => {
                    PROFILE_RESOLUTIONS_TOTAL.with_label_values(&["id_token"]).inc();
                    debug!("Profile resolved from verified ID token");
                    return Ok(profile);
                }
                Err(error) => {
                    debug!(%error, "ID token verification failed, falling back to userinfo");
                }
            }
        }

        let access_token = tokens
            .access_token
            .as_deref()
            .ok_or_else(|| AppError::Oidc("token response carried no access token".to_string()))?;

        let profile = self.fetch_userinfo(access_token).await?;
        PROFILE_RESOLUTIONS_TOTAL.with_label_values(&["userinfo"]).inc();
        debug!("Profile resolved from userinfo endpoint");
        Ok(profile)
    }
}
