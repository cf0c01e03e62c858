//! ID-token verification
//!
//! Verifies the provider-issued ID token locally: signature against the
//! provider JWKS, standard claims (`iss`, `aud`, `exp`), and the per-login
//! nonce. Any failure here is not fatal; the caller falls back to the
//! userinfo endpoint.
//!
//! The JWKS is cached for an hour and refreshed once when a token arrives
//! with an unknown `kid`, so a key rotation does not require a restart.

use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation, jwk::JwkSet};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::metadata::ProviderMetadata;
use super::profile::UserProfile;

/// ID-token verification failure
#[derive(Debug, thiserror::Error)]
pub enum IdTokenError {
    /// Signature or standard-claim validation failed
    #[error("JWT verification failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The provider metadata carries no `jwks_uri`
    #[error("provider metadata has no jwks_uri")]
    MissingJwksUri,

    /// The JWT header contains no `kid` field
    #[error("ID token missing 'kid' in header")]
    MissingKeyId,

    /// The `kid` in the JWT header is not in the provider's JWKS
    #[error("unknown key ID: {0}")]
    UnknownKeyId(String),

    /// The token's nonce does not match this login attempt
    #[error("nonce mismatch")]
    NonceMismatch,

    /// Network or HTTP error while fetching the JWKS
    #[error("JWKS fetch error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Claims this service reads out of a verified ID token
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
}

struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Verifies ID tokens against the provider JWKS
pub struct IdTokenVerifier {
    http: reqwest::Client,
    cache: RwLock<Option<CachedJwks>>,
    /// How long a fetched JWKS stays valid
    ttl: Duration,
}

impl IdTokenVerifier {
    /// Create with the default 1-hour JWKS cache TTL.
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            cache: RwLock::new(None),
            ttl: Duration::from_secs(3600),
        }
    }

    /// Verify `token` and extract the profile claims.
    ///
    /// Checks, in order: signature against the JWKS key named by the
    /// header `kid`, issuer, audience (the client id), expiry, and the
    /// stored login nonce.
    ///
    /// # Errors
    /// Returns [`IdTokenError`] describing the first check that failed.
    pub async fn verify(
        &self,
        token: &str,
        metadata: &ProviderMetadata,
        client_id: &str,
        expected_nonce: &str,
    ) -> Result<UserProfile, IdTokenError> {
        let jwks_uri = metadata
            .jwks_uri
            .as_deref()
            .ok_or(IdTokenError::MissingJwksUri)?;

        let header = jsonwebtoken::decode_header(token)?;
        let kid = header.kid.ok_or(IdTokenError::MissingKeyId)?;

        let decoding_key = self.find_decoding_key(&kid, jwks_uri).await?;

        let validation = build_validation(header.alg, &metadata.issuer, client_id);

        let token_data: TokenData<IdTokenClaims> =
            jsonwebtoken::decode(token, &decoding_key, &validation)?;
        let claims = token_data.claims;

        if claims.nonce.as_deref() != Some(expected_nonce) {
            return Err(IdTokenError::NonceMismatch);
        }

        Ok(UserProfile {
            sub: Some(claims.sub),
            id: None,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        })
    }

    /// Find a decoding key by `kid`, refreshing the JWKS once if not found.
    async fn find_decoding_key(
        &self,
        kid: &str,
        jwks_uri: &str,
    ) -> Result<DecodingKey, IdTokenError> {
        let jwks = self.get_or_fetch(jwks_uri, false).await?;
        if let Some(key) = find_key_in_jwks(&jwks, kid) {
            return key.map_err(IdTokenError::Jwt);
        }

        // Unknown kid: the provider may have rotated keys. Refresh once.
        debug!(kid = %kid, "Key not found in cached JWKS, refreshing");
        let jwks = self.get_or_fetch(jwks_uri, true).await?;
        find_key_in_jwks(&jwks, kid)
            .ok_or_else(|| IdTokenError::UnknownKeyId(kid.to_string()))?
            .map_err(IdTokenError::Jwt)
    }

    /// Return the cached JWKS, or fetch it when stale or `force_refresh`.
    async fn get_or_fetch(&self, jwks_uri: &str, force_refresh: bool) -> Result<JwkSet, IdTokenError> {
        if !force_refresh {
            let cached = self.cache.read().await;
            if let Some(ref entry) = *cached {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.keys.clone());
                }
            }
        }

        debug!(url = %jwks_uri, "Fetching provider JWKS");
        let jwks: JwkSet = self.http.get(jwks_uri).send().await?.json().await?;

        *self.cache.write().await = Some(CachedJwks {
            keys: jwks.clone(),
            fetched_at: Instant::now(),
        });

        Ok(jwks)
    }
}

/// Build a [`Validation`] from the JWT header algorithm.
///
/// Only asymmetric algorithms are accepted; anything else validates as
/// RS256 and fails at signature verification.
fn build_validation(alg: Algorithm, issuer: &str, client_id: &str) -> Validation {
    let alg = match alg {
        Algorithm::RS256 => Algorithm::RS256,
        Algorithm::RS384 => Algorithm::RS384,
        Algorithm::RS512 => Algorithm::RS512,
        Algorithm::ES256 => Algorithm::ES256,
        Algorithm::ES384 => Algorithm::ES384,
        other => {
            warn!(alg = ?other, "Unsupported ID token algorithm, defaulting to RS256");
            Algorithm::RS256
        }
    };

    let mut validation = Validation::new(alg);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[client_id]);
    validation
}

fn find_key_in_jwks(
    jwks: &JwkSet,
    kid: &str,
) -> Option<Result<DecodingKey, jsonwebtoken::errors::Error>> {
    jwks.keys
        .iter()
        .find(|jwk| jwk.common.key_id.as_deref() == Some(kid))
        .map(DecodingKey::from_jwk)
}
