//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Login flow metrics
    pub static ref LOGINS_STARTED_TOTAL: IntCounter = IntCounter::new(
        "authgate_logins_started_total",
        "Total number of login flows initiated"
    ).expect("metric can be created");
    pub static ref CALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("authgate_callbacks_total", "OAuth callbacks by outcome"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref PROFILE_RESOLUTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("authgate_profile_resolutions_total", "Profile resolutions by source"),
        &["source"]
    ).expect("metric can be created");

    // Session metrics
    pub static ref SESSIONS_ISSUED_TOTAL: IntCounter = IntCounter::new(
        "authgate_sessions_issued_total",
        "Total number of session tokens issued"
    ).expect("metric can be created");
    pub static ref SESSION_CHECKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("authgate_session_checks_total", "Session verifications by result"),
        &["result"]
    ).expect("metric can be created");

    // Error metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("authgate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Register all metrics with the global registry.
///
/// Must be called exactly once at startup.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(LOGINS_STARTED_TOTAL.clone()))
        .expect("LOGINS_STARTED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CALLBACKS_TOTAL.clone()))
        .expect("CALLBACKS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PROFILE_RESOLUTIONS_TOTAL.clone()))
        .expect("PROFILE_RESOLUTIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SESSIONS_ISSUED_TOTAL.clone()))
        .expect("SESSIONS_ISSUED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SESSION_CHECKS_TOTAL.clone()))
        .expect("SESSION_CHECKS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");
}

/// Metrics endpoint handler
///
/// Returns all metrics in Prometheus text format.
async fn metrics_handler() -> axum::response::Response {
    use axum::response::IntoResponse;
    use prometheus::{Encoder, TextEncoder};

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, encoder.format_type())],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}

/// Create metrics router
///
/// Exposes the `/metrics` endpoint.
pub fn metrics_router<S>() -> axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    axum::Router::new().route("/metrics", axum::routing::get(metrics_handler))
}
