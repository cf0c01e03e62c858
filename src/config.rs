//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)
//!
//! The flat environment names `SECRET_KEY`, `FRONTEND_URL`,
//! `GOOGLE_CLIENT_ID` and `GOOGLE_CLIENT_SECRET` are honored on top of the
//! layered `AUTHGATE__*` sources so the service can be configured the same
//! way in every deployment environment.

use serde::Deserialize;
use std::net::IpAddr;

/// Insecure development signing key. Only acceptable on localhost.
pub const DEV_SECRET_KEY: &str = "dev_secret";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub frontend: FrontendConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 5000)
    pub port: u16,
    /// Public domain, including port when non-standard
    /// (e.g., "auth.example.com" or "localhost:5000")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the public base URL of this service
    ///
    /// # Returns
    /// Full URL like "https://auth.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }

    /// Redirect URI registered with the identity provider
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.base_url())
    }
}

/// Frontend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// Origin of the browser frontend. Used as the CORS allow-list and as
    /// the base for post-login redirects.
    pub url: String,
}

impl FrontendConfig {
    /// Post-login redirect target, e.g. "http://localhost:5173/auth/success"
    pub fn success_url(&self) -> String {
        format!("{}/auth/success", self.url.trim_end_matches('/'))
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session token signing secret
    pub secret_key: String,
    /// Session max age in seconds (default: 14400 = 4 hours)
    pub session_max_age: i64,
    /// Lifetime of the transient per-login state cookie in seconds
    /// (default: 600 = 10 minutes)
    pub login_state_max_age: i64,
    pub google: GoogleOAuthConfig,
}

/// Google OIDC provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// OIDC discovery document URL
    pub discovery_url: String,
    /// Userinfo endpoint, used when the discovery document omits one
    pub userinfo_url: String,
    /// Space-separated scopes requested at authorization time
    pub scopes: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (AUTHGATE__*)
    /// 5. Flat environment overrides (SECRET_KEY, FRONTEND_URL,
    ///    GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("server.domain", "localhost:5000")?
            .set_default("server.protocol", "http")?
            .set_default("frontend.url", "http://localhost:5173")?
            .set_default("auth.secret_key", DEV_SECRET_KEY)?
            .set_default("auth.session_max_age", 14_400)?
            .set_default("auth.login_state_max_age", 600)?
            .set_default("auth.google.client_id", "")?
            .set_default("auth.google.client_secret", "")?
            .set_default(
                "auth.google.discovery_url",
                "https://accounts.google.com/.well-known/openid-configuration",
            )?
            .set_default(
                "auth.google.userinfo_url",
                "https://openidconnect.googleapis.com/v1/userinfo",
            )?
            .set_default("auth.google.scopes", "openid email profile")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (AUTHGATE_*)
            .add_source(
                Environment::with_prefix("AUTHGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            // Flat environment names win over everything else
            .set_override_option("auth.secret_key", std::env::var("SECRET_KEY").ok())?
            .set_override_option("frontend.url", std::env::var("FRONTEND_URL").ok())?
            .set_override_option("auth.google.client_id", std::env::var("GOOGLE_CLIENT_ID").ok())?
            .set_override_option(
                "auth.google.client_secret",
                std::env::var("GOOGLE_CLIENT_SECRET").ok(),
            )?
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Whether session cookies should carry the `Secure` attribute.
    ///
    /// Secure is required everywhere except plain-http development setups
    /// on a local domain.
    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.login_state_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.login_state_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.secret_key == DEV_SECRET_KEY {
            tracing::warn!(
                "Using the built-in development secret key; set SECRET_KEY before deploying"
            );
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
