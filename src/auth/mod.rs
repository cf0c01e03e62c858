//! OIDC authentication
//!
//! Handles:
//! - The OpenID Connect login flow
//! - Signed-cookie session management
//! - Transient per-login state
//! - Authentication middleware

mod middleware;
mod oauth;
pub mod session;
pub mod state;

pub use middleware::CurrentUser;
pub use oauth::auth_router;
pub use session::{SESSION_COOKIE, Session, create_session_token, verify_session_token};
pub use state::{LoginState, STATE_COOKIE};
