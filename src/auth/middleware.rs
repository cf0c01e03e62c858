//! Authentication middleware
//!
//! Protects routes that require a valid session.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;

use super::session::{SESSION_COOKIE, Session, verify_session_token};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::SESSION_CHECKS_TOTAL;

/// Extractor for the current authenticated user
///
/// Reads the session cookie and verifies it. Rejection carries the
/// distinction the client needs: missing cookie (`unauthenticated`) vs.
/// present-but-invalid cookie (`invalid token` with a detail string).
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(session): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", session.subject)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .ok_or(AppError::Unauthenticated)?;

        match verify_session_token(&token, &app_state.config.auth.secret_key) {
            Ok(session) => {
                SESSION_CHECKS_TOTAL.with_label_values(&["ok"]).inc();
                Ok(CurrentUser(session))
            }
            Err(error) => {
                SESSION_CHECKS_TOTAL.with_label_values(&["rejected"]).inc();
                tracing::debug!(%error, "Session token rejected");
                Err(AppError::InvalidToken(error.to_string()))
            }
        }
    }
}
