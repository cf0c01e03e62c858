//! Common test utilities for E2E tests

use std::collections::HashMap;
use std::sync::Arc;

use authgate::{AppState, config};
use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use tokio::net::TcpListener;

/// Signing secret used by every test server
pub const TEST_SECRET: &str = "test-secret-key-32-bytes-long!!!";

/// Frontend origin used by every test server
pub const FRONTEND_URL: &str = "http://localhost:5173";

/// Access token the fake provider hands out and accepts
pub const PROVIDER_ACCESS_TOKEN: &str = "fake-access-token";

/// `kid` of the fake provider's signing key
pub const PROVIDER_KEY_ID: &str = "test-key-1";

/// Subject claim inside provider-signed ID tokens; distinct from the
/// userinfo subject so tests can tell the two resolution paths apart
pub const ID_TOKEN_SUB: &str = "id-token-sub";

// =============================================================================
// Fake identity provider
// =============================================================================

/// In-process OIDC provider stub
///
/// Serves a discovery document pointing at itself, a JWKS with one
/// generated RSA key, a token endpoint that understands a few magic
/// authorization codes, and a userinfo endpoint:
/// - code `good-code` → access token only, userinfo succeeds
/// - code `id:{nonce}` → access token plus an RS256-signed ID token
///   carrying `{nonce}` as its nonce claim
/// - code `empty-token` → HTTP 200 with no tokens in the body
/// - anything else → HTTP 400
pub struct FakeProvider {
    pub base_url: String,
}

struct ProviderState {
    base_url: String,
    encoding_key: jsonwebtoken::EncodingKey,
    jwk: serde_json::Value,
}

impl FakeProvider {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let private_key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let pem = private_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .unwrap();
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();

        let public_key = private_key.to_public_key();
        let jwk = serde_json::json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": PROVIDER_KEY_ID,
            "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        });

        let state = Arc::new(ProviderState {
            base_url: base_url.clone(),
            encoding_key,
            jwk,
        });
        let app = provider_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url }
    }

    pub fn discovery_url(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.base_url)
    }
}

fn provider_router(state: Arc<ProviderState>) -> Router {
    Router::new()
        .route("/.well-known/openid-configuration", get(discovery))
        .route("/jwks", get(jwks))
        .route("/token", post(token))
        .route("/userinfo", get(userinfo))
        .with_state(state)
}

async fn discovery(State(provider): State<Arc<ProviderState>>) -> Json<serde_json::Value> {
    let base = &provider.base_url;
    Json(serde_json::json!({
        "issuer": base,
        "authorization_endpoint": format!("{base}/authorize"),
        "token_endpoint": format!("{base}/token"),
        "userinfo_endpoint": format!("{base}/userinfo"),
        "jwks_uri": format!("{base}/jwks"),
    }))
}

async fn jwks(State(provider): State<Arc<ProviderState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "keys": [provider.jwk.clone()] }))
}

async fn token(
    State(provider): State<Arc<ProviderState>>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    if params.get("grant_type").map(String::as_str) != Some("authorization_code") {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "unsupported_grant_type" })),
        )
            .into_response();
    }

    let code = params.get("code").map(String::as_str).unwrap_or_default();

    if let Some(nonce) = code.strip_prefix("id:") {
        return Json(serde_json::json!({
            "access_token": PROVIDER_ACCESS_TOKEN,
            "id_token": sign_id_token(&provider, nonce),
            "token_type": "Bearer",
            "expires_in": 3600,
        }))
        .into_response();
    }

    match code {
        "good-code" => Json(serde_json::json!({
            "access_token": PROVIDER_ACCESS_TOKEN,
            "token_type": "Bearer",
            "expires_in": 3600,
        }))
        .into_response(),
        "empty-token" => Json(serde_json::json!({})).into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid_grant" })),
        )
            .into_response(),
    }
}

fn sign_id_token(provider: &ProviderState, nonce: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "iss": provider.base_url,
        "aud": "test-client-id",
        "sub": ID_TOKEN_SUB,
        "email": "signed@b.com",
        "name": "Signed",
        "iat": now,
        "exp": now + 3600,
        "nonce": nonce,
    });

    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = Some(PROVIDER_KEY_ID.to_string());
    jsonwebtoken::encode(&header, &claims, &provider.encoding_key).unwrap()
}

async fn userinfo(headers: HeaderMap) -> Response {
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok());

    if bearer == Some(&format!("Bearer {PROVIDER_ACCESS_TOKEN}")) {
        Json(serde_json::json!({
            "sub": "123",
            "email": "a@b.com",
            "name": "A",
        }))
        .into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

// =============================================================================
// Test server
// =============================================================================

/// Test server instance running the full router against a fake provider
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: FakeProvider,
    /// Client that does not follow redirects; every auth endpoint redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let provider = FakeProvider::spawn().await;

        // Bind first so the public domain in the config matches reality
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: addr.port(),
                domain: addr.to_string(),
                protocol: "http".to_string(),
            },
            frontend: config::FrontendConfig {
                url: FRONTEND_URL.to_string(),
            },
            auth: config::AuthConfig {
                secret_key: TEST_SECRET.to_string(),
                session_max_age: 14_400,
                login_state_max_age: 600,
                google: config::GoogleOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                    discovery_url: provider.discovery_url(),
                    userinfo_url: format!("{}/userinfo", provider.base_url),
                    scopes: "openid email profile".to_string(),
                },
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).unwrap();
        let app = authgate::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr: format!("http://{addr}"),
            state,
            provider,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Start a login flow and return the `state` query parameter the
    /// provider would echo back plus the sealed `oauth_state` cookie value.
    pub async fn start_login(&self) -> (String, String) {
        let response = self
            .client
            .get(self.url("/login"))
            .send()
            .await
            .expect("login request succeeds");
        assert!(response.status().is_redirection(), "login must redirect");

        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .expect("location header");
        let auth_url = url::Url::parse(location).expect("authorize URL parses");
        let state = auth_url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.to_string())
            .expect("state parameter present");

        let cookie = extract_cookie(&response, "oauth_state").expect("oauth_state cookie set");
        (state, cookie)
    }
}

/// Pull a named cookie value out of a response's Set-Cookie headers.
///
/// Returns `None` when the cookie is absent or set to the empty string
/// (i.e. a removal cookie).
pub fn extract_cookie(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| {
            let pair = raw.split(';').next()?;
            let (cookie_name, cookie_value) = pair.split_once('=')?;
            (cookie_name.trim() == name && !cookie_value.is_empty())
                .then(|| cookie_value.to_string())
        })
        .next()
}
