//! Authgate - a small OIDC login backend issuing signed session cookies
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Handler Layer (Axum)                      │
//! │  - /login, /auth/callback, /api/me, /logout                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      OIDC Layer                             │
//! │  - Provider metadata discovery                              │
//! │  - Code-for-token exchange                                  │
//! │  - ID-token verification / userinfo fallback                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Session Codec                           │
//! │  - HMAC-SHA256 signed cookie tokens, no server-side store   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `auth`: HTTP handlers, session codec, transient login state
//! - `oidc`: OpenID Connect client for the configured provider
//! - `config`: Configuration management
//! - `metrics`: Prometheus instruments
//! - `error`: Error types

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod oidc;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the OIDC client and HTTP client. It is built
/// explicitly at startup and injected into the router, so tests can run
/// the full stack against a fake provider.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// OIDC client for the configured provider; owns the shared HTTP
    /// client for all outbound provider calls
    pub oidc: Arc<oidc::OidcClient>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Build the shared HTTP client (bounded timeout)
    /// 2. Build the OIDC client (provider metadata is discovered lazily,
    ///    on the first login)
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let http_client = reqwest::Client::builder()
            .user_agent("Authgate/0.1.0")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        let oidc = oidc::OidcClient::new(config.auth.google.clone(), http_client);

        Ok(Self {
            config: Arc::new(config),
            oidc: Arc::new(oidc),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.frontend);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(metrics::metrics_router())
}

/// Cross-origin policy: only the configured frontend origin, with
/// credentials so the browser sends the session cookie.
fn build_cors_layer(frontend: &config::FrontendConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let origin = frontend.url.trim_end_matches('/');
    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %frontend.url,
                "Failed to parse CORS origin from frontend URL; denying cross-origin requests"
            );
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
