//! Session management
//!
//! Uses HMAC-signed tokens stored in cookies.
//! No server-side session storage needed.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::oidc::UserProfile;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie carrying the signed session token
pub const SESSION_COOKIE: &str = "access_token";

/// Session verification failure
///
/// The `Display` form of each variant is surfaced as the `detail` string
/// in the 401 response of the identity check endpoint.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Token is not `payload.signature` or the payload is not valid JSON
    #[error("malformed token")]
    Malformed,

    /// HMAC signature does not match the payload
    #[error("signature mismatch")]
    InvalidSignature,

    /// Session expiry is in the past
    #[error("token expired")]
    Expired,

    /// HMAC key setup failed
    #[error("crypto error: {0}")]
    Crypto(String),
}

/// User session claims
///
/// Stored in a signed cookie. Contains the minimal identity fields
/// resolved from the OIDC provider at login time; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Provider subject (the `sub` claim, or `id` when the provider
    /// returned no `sub`)
    #[serde(rename = "sub")]
    pub subject: String,
    /// Email address
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Avatar URL
    pub picture: Option<String>,
    /// When the session expires (unix seconds)
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from a resolved provider profile.
    ///
    /// Expiry is `max_age_seconds` from now.
    pub fn from_profile(profile: &UserProfile, max_age_seconds: i64) -> Self {
        Self {
            subject: profile.subject().unwrap_or_default(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            picture: profile.picture.clone(),
            expires_at: Utc::now() + Duration::seconds(max_age_seconds),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Sign arbitrary claims into a `base64(payload).base64(hmac_sha256(payload))`
/// token. Shared by the session codec and the transient login-state codec.
pub(crate) fn sign_claims<T: Serialize>(claims: &T, secret: &str) -> Result<String, SessionError> {
    // 1. Serialize claims to JSON
    let payload = serde_json::to_string(claims).map_err(|e| SessionError::Crypto(e.to_string()))?;

    // 2. Base64 encode the payload
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload.as_bytes());

    // 3. Create HMAC-SHA256 signature
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SessionError::Crypto(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = URL_SAFE_NO_PAD.encode(signature);

    // 4. Return "{payload}.{signature}"
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify a signed token and decode its claims.
///
/// Expiry is not checked here; each claim type enforces its own.
pub(crate) fn open_claims<T: serde::de::DeserializeOwned>(
    token: &str,
    secret: &str,
) -> Result<T, SessionError> {
    // 1. Split token into payload and signature
    let (payload_b64, signature_b64) = token.split_once('.').ok_or(SessionError::Malformed)?;
    if signature_b64.contains('.') {
        return Err(SessionError::Malformed);
    }

    // 2. Verify HMAC signature before trusting the payload
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SessionError::Crypto(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| SessionError::Malformed)?;

    mac.verify_slice(&expected_signature)
        .map_err(|_| SessionError::InvalidSignature)?;

    // 3. Decode and deserialize payload
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| SessionError::Malformed)?;

    serde_json::from_slice(&payload_bytes).map_err(|_| SessionError::Malformed)
}

/// Create a signed session token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `session` - Session data to encode
/// * `secret` - HMAC secret key
///
/// # Returns
/// Signed token string
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, SessionError> {
    sign_claims(session, secret)
}

/// Verify and decode a session token
///
/// # Arguments
/// * `token` - Token string to verify
/// * `secret` - HMAC secret key
///
/// # Returns
/// Decoded session if the signature is valid and the session has not expired
///
/// # Errors
/// Returns [`SessionError`] describing the first verification step that failed
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, SessionError> {
    let session: Session = open_claims(token, secret)?;

    if session.is_expired() {
        return Err(SessionError::Expired);
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-32-bytes-long!!!";

    fn sample_session(max_age_seconds: i64) -> Session {
        Session {
            subject: "123".to_string(),
            email: Some("a@b.com".to_string()),
            name: Some("A".to_string()),
            picture: Some("https://example.com/a.png".to_string()),
            expires_at: Utc::now() + Duration::seconds(max_age_seconds),
        }
    }

    #[test]
    fn round_trip_preserves_claims() {
        let session = sample_session(14_400);
        let token = create_session_token(&session, SECRET).unwrap();
        let decoded = verify_session_token(&token, SECRET).unwrap();

        assert_eq!(decoded.subject, "123");
        assert_eq!(decoded.email.as_deref(), Some("a@b.com"));
        assert_eq!(decoded.name.as_deref(), Some("A"));
        assert_eq!(
            decoded.expires_at.timestamp(),
            session.expires_at.timestamp()
        );
    }

    #[test]
    fn serializes_short_claim_names() {
        let session = sample_session(60);
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["sub"], "123");
        assert!(json["exp"].is_i64());
        assert!(json.get("subject").is_none());
    }

    #[test]
    fn rejects_expired_session() {
        let session = sample_session(-60);
        let token = create_session_token(&session, SECRET).unwrap();
        assert!(matches!(
            verify_session_token(&token, SECRET),
            Err(SessionError::Expired)
        ));
    }

    #[test]
    fn rejects_foreign_secret() {
        let token = create_session_token(&sample_session(60), SECRET).unwrap();
        assert!(matches!(
            verify_session_token(&token, "another-secret-key-32-bytes!!!!!"),
            Err(SessionError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_tampered_payload() {
        let token = create_session_token(&sample_session(60), SECRET).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "sub": "999",
                "email": null,
                "name": null,
                "picture": null,
                "exp": (Utc::now() + Duration::hours(4)).timestamp(),
            })
            .to_string(),
        );
        let forged = format!("{forged_payload}.{signature}");
        assert!(matches!(
            verify_session_token(&forged, SECRET),
            Err(SessionError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in ["", "no-dot", "a.b.c", "!!!.???"] {
            assert!(matches!(
                verify_session_token(token, SECRET),
                Err(SessionError::Malformed)
            ));
        }
    }

    #[test]
    fn from_profile_prefers_sub_over_id() {
        let profile = UserProfile {
            sub: Some("sub-1".to_string()),
            id: Some("id-1".to_string()),
            email: None,
            name: None,
            picture: None,
        };
        let session = Session::from_profile(&profile, 60);
        assert_eq!(session.subject, "sub-1");
        assert!(!session.is_expired());
    }
}
