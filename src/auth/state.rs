//! Transient per-login OAuth state
//!
//! Each login attempt carries a random `state` (CSRF protection) and
//! `nonce` (ID-token replay protection). Both are sealed into a signed,
//! short-lived first-party cookie so they are keyed to the browser that
//! started the flow, not held in process-global storage. The cookie is
//! consumed when the callback completes.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::session::{SessionError, open_claims, sign_claims};

/// Name of the cookie carrying the sealed login state
pub const STATE_COOKIE: &str = "oauth_state";

/// Per-login state and nonce, valid for one authorization round trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginState {
    /// CSRF state echoed back by the provider
    pub state: String,
    /// Nonce embedded in the ID token by the provider
    pub nonce: String,
    /// When this login attempt stops being valid (unix seconds)
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl LoginState {
    /// Generate fresh random state and nonce values.
    pub fn generate(max_age_seconds: i64) -> Self {
        Self {
            state: random_token(),
            nonce: random_token(),
            expires_at: Utc::now() + Duration::seconds(max_age_seconds),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Seal a login state into a signed cookie value.
pub fn seal_login_state(state: &LoginState, secret: &str) -> Result<String, SessionError> {
    sign_claims(state, secret)
}

/// Open a sealed login state, rejecting expired attempts.
pub fn open_login_state(token: &str, secret: &str) -> Result<LoginState, SessionError> {
    let state: LoginState = open_claims(token, secret)?;

    if state.is_expired() {
        return Err(SessionError::Expired);
    }

    Ok(state)
}

/// 16 random bytes, base64url-encoded
fn random_token() -> String {
    let bytes: [u8; 16] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}
