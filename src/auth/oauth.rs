//! OIDC login flow
//!
//! Implements the OpenID Connect authorization-code flow against the
//! configured provider and the session endpoints built on top of it.
//!
//! The callback handler never surfaces an HTTP error: every failure
//! degrades to a redirect to the frontend carrying a status indicator
//! (`ok`, `error` or `cancelled`) in the query string.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;
use tracing::{info, warn};

use crate::AppState;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::metrics::{CALLBACKS_TOTAL, LOGINS_STARTED_TOTAL, SESSIONS_ISSUED_TOTAL};

use super::middleware::CurrentUser;
use super::session::{SESSION_COOKIE, Session, create_session_token};
use super::state::{LoginState, STATE_COOKIE, open_login_state, seal_login_state};

/// Create authentication router
///
/// Routes:
/// - GET /login - Redirect to the identity provider
/// - GET /auth/callback - OAuth callback
/// - GET /api/me - Identity check for the current session
/// - POST /logout - Clear the session
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/auth/callback", get(auth_callback))
        .route("/api/me", get(me))
        .route("/logout", post(logout))
}

// =============================================================================
// Login initiator
// =============================================================================

/// GET /login
///
/// Generates the per-login state and nonce, seals them into the
/// `oauth_state` cookie, and redirects the browser to the provider's
/// authorization endpoint.
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let login = LoginState::generate(state.config.auth.login_state_max_age);

    let redirect_uri = state.config.server.callback_url();
    let auth_url = state.oidc.authorization_url(&redirect_uri, &login).await?;

    let sealed = seal_login_state(&login, &state.config.auth.secret_key)
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

    LOGINS_STARTED_TOTAL.inc();
    info!("Redirecting browser to identity provider");

    Ok((
        jar.add(state_cookie(sealed, &state.config)),
        Redirect::to(auth_url.as_str()),
    ))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from the provider callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    /// Authorization code (absent when the user cancelled)
    code: Option<String>,
    /// CSRF state echoed back by the provider
    state: Option<String>,
    /// Provider-reported error, e.g. `access_denied`
    error: Option<String>,
}

/// GET /auth/callback
///
/// Completes the login: validates the transient state, exchanges the code
/// for tokens, resolves the user's profile, and sets the signed session
/// cookie. The transient `oauth_state` cookie is consumed either way.
async fn auth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let success_url = state.config.frontend.success_url();
    let jar_without_state = jar.clone().remove(removal_cookie(STATE_COOKIE));

    // User cancelled or the provider reported an error: no code to exchange.
    if let Some(ref reason) = query.error {
        CALLBACKS_TOTAL.with_label_values(&["cancelled"]).inc();
        info!(reason = %reason, "Login cancelled at the provider");
        let target = format!(
            "{success_url}?status=cancelled&reason={}",
            urlencoding::encode(reason)
        );
        return (jar_without_state, Redirect::to(&target));
    }

    match complete_login(&state, &query, &jar).await {
        Ok(session_token) => {
            CALLBACKS_TOTAL.with_label_values(&["ok"]).inc();
            SESSIONS_ISSUED_TOTAL.inc();
            let jar = jar_without_state.add(session_cookie(session_token, &state.config));
            (jar, Redirect::to(&format!("{success_url}?status=ok")))
        }
        Err(error) => {
            CALLBACKS_TOTAL.with_label_values(&["error"]).inc();
            // Detail stays in the logs; the browser URL only learns that it failed.
            warn!(%error, "Login callback failed");
            (
                jar_without_state,
                Redirect::to(&format!("{success_url}?status=error")),
            )
        }
    }
}

/// The fallible part of the callback. Any error here becomes a
/// `status=error` redirect in the handler above.
async fn complete_login(
    state: &AppState,
    query: &CallbackQuery,
    jar: &CookieJar,
) -> Result<String, AppError> {
    let secret = &state.config.auth.secret_key;

    // Validate the transient login state against the browser's cookie.
    let sealed = jar
        .get(STATE_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .ok_or_else(|| AppError::Oidc("missing login state cookie".to_string()))?;
    let login = open_login_state(&sealed, secret)
        .map_err(|e| AppError::Oidc(format!("invalid login state: {e}")))?;

    let echoed_state = query
        .state
        .as_deref()
        .ok_or_else(|| AppError::Oidc("callback carried no state".to_string()))?;
    if echoed_state != login.state {
        return Err(AppError::Oidc("state mismatch".to_string()));
    }

    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AppError::Oidc("callback carried no code".to_string()))?;

    // Exchange the code and resolve the user's profile.
    let redirect_uri = state.config.server.callback_url();
    let tokens = state.oidc.exchange_code(code, &redirect_uri).await?;
    let profile = state.oidc.resolve_profile(&tokens, &login.nonce).await?;

    if profile.subject().is_none() {
        return Err(AppError::Oidc("profile carried no subject".to_string()));
    }

    // Mint the signed session token.
    let session = Session::from_profile(&profile, state.config.auth.session_max_age);
    info!(subject = %session.subject, "Session established");

    create_session_token(&session, secret).map_err(|e| AppError::Internal(anyhow::Error::new(e)))
}

// =============================================================================
// Identity check
// =============================================================================

/// GET /api/me
///
/// Returns the decoded session claims, or 401 when the cookie is missing
/// (`unauthenticated`) or fails verification (`invalid token` + detail).
async fn me(CurrentUser(session): CurrentUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "user": session }))
}

// =============================================================================
// Logout
// =============================================================================

/// POST /logout
///
/// Clears the session and any pending login state. Idempotent; always 200.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .remove(removal_cookie(SESSION_COOKIE))
        .remove(removal_cookie(STATE_COOKIE));

    (
        jar,
        Json(serde_json::json!({ "ok": true, "msg": "logged out" })),
    )
}

// =============================================================================
// Cookie helpers
// =============================================================================

/// Session cookie: HTTP-only, SameSite=Lax, expires with the session
fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(config.auth.session_max_age))
        .build()
}

/// Transient login-state cookie: same attributes, short lifetime
fn state_cookie(sealed: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, sealed))
        .path("/")
        .http_only(true)
        .secure(config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(config.auth.login_state_max_age))
        .build()
}

/// Expired cookie for removal; path must match the original
fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}
