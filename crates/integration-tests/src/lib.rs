//! Integration tests for the AZMOTOS storefront.
//!
//! The whole router is driven in-process with `tower::ServiceExt::oneshot`
//! against an in-memory [`FakeGateway`], so the tests need no network and no
//! running backend.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p azmotos-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `auth` - Sign-in, registration, sign-out and the session gate
//! - `catalog` - Catalog page, HTMX results and motorcycle detail
//! - `platform` - Health, security headers, contact and session events

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, HeaderValue, Request, Response, header},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use azmotos_storefront::config::{SignupConfig, StorefrontConfig, SupabaseConfig};
use azmotos_storefront::middleware::session::SESSION_COOKIE_NAME;
use azmotos_storefront::state::AppState;
pub use azmotos_storefront::supabase::FakeGateway;

/// Email of the member created by [`TestApp::with_member`].
pub const MEMBER_EMAIL: &str = "rider@azmotos.kz";
/// Password of the member created by [`TestApp::with_member`].
pub const MEMBER_PASSWORD: &str = "throttle-42";

/// Id of [`bmw_row`].
pub const BMW_ID: &str = "6f1c7a52-2b0e-4d8c-9a43-1e2f3a4b5c6d";
/// Id of [`ducati_row`].
pub const DUCATI_ID: &str = "0a9e5d1b-7c3f-4e28-b6a1-9f8e7d6c5b4a";

/// A BMW adventure bike with full specs.
#[must_use]
pub fn bmw_row() -> Value {
    json!({
        "id": BMW_ID,
        "brand": "BMW",
        "model": "R 1250 GS Adventure",
        "year": 2022,
        "price": 12_500_000,
        "description": "Long-range adventure tourer.",
        "specs": {
            "engine": "1254 cc boxer twin",
            "power": "136 hp",
            "weight": "268 kg",
            "topSpeed": "220 km/h"
        },
        "image_url": null,
        "created_at": "2024-03-01T10:00:00+00:00"
    })
}

/// A Ducati superbike without specs or description.
#[must_use]
pub fn ducati_row() -> Value {
    json!({
        "id": DUCATI_ID,
        "brand": "Ducati",
        "model": "Panigale V4",
        "year": 2023,
        "price": 14_900_000,
        "description": null,
        "specs": null,
        "image_url": "https://example.supabase.co/storage/v1/object/public/bikes/v4.jpg",
        "created_at": "2024-04-01T10:00:00+00:00"
    })
}

/// Configuration pointing at a backend that is never contacted.
///
/// # Panics
///
/// Never; the backend URL is a constant.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_config() -> StorefrontConfig {
    let supabase = SupabaseConfig {
        url: "https://example.supabase.co".parse().unwrap(),
        anon_key: SecretString::from("test-anon-key"),
        request_timeout: None,
    };
    let mut config = StorefrontConfig::with_defaults("http://localhost:3000", supabase);
    config.static_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../storefront/static").into();
    config.signup = SignupConfig {
        backoff_base: Duration::from_millis(10),
        backoff_cap: Duration::from_millis(100),
        profile_settle_delay: Duration::ZERO,
    };
    config
}

/// The storefront router wired to a shared [`FakeGateway`].
pub struct TestApp {
    pub gateway: Arc<FakeGateway>,
    pub state: AppState,
    router: Router,
    next_client: AtomicU32,
}

impl TestApp {
    /// Build the app with the default test configuration.
    #[must_use]
    pub fn new(gateway: FakeGateway) -> Self {
        Self::with_config(gateway, |_| {})
    }

    /// Build the app after adjusting the test configuration.
    #[must_use]
    pub fn with_config(gateway: FakeGateway, adjust: impl FnOnce(&mut StorefrontConfig)) -> Self {
        let mut config = test_config();
        adjust(&mut config);

        let gateway = Arc::new(gateway);
        let state = AppState::new(config, gateway.clone());
        let router = azmotos_storefront::app(state.clone());

        Self {
            gateway,
            state,
            router,
            next_client: AtomicU32::new(1),
        }
    }

    /// The catalog rows plus one registered member.
    #[must_use]
    pub fn with_member() -> Self {
        let gateway = FakeGateway::new().with_rows("motorcycles", [bmw_row(), ducati_row()]);
        gateway.add_user(MEMBER_EMAIL, MEMBER_PASSWORD);
        Self::new(gateway)
    }

    /// Send a request as a distinct client, so per-IP rate limits never
    /// carry over between requests.
    ///
    /// # Panics
    ///
    /// Panics if the router fails, which it never does.
    #[allow(clippy::unwrap_used)]
    pub async fn send(&self, mut request: Request<Body>) -> Response<Body> {
        let n = self.next_client.fetch_add(1, Ordering::Relaxed);
        let ip = format!("10.{}.{}.{}", (n >> 16) & 0xff, (n >> 8) & 0xff, n & 0xff);
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_str(&ip).unwrap());
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// `GET path`, with the session cookie if given.
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(build_request("GET", path, cookie, None, false)).await
    }

    /// `GET path` as an HTMX request.
    pub async fn get_htmx(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(build_request("GET", path, cookie, None, true)).await
    }

    /// `POST path` with a url-encoded form body.
    pub async fn post_form(&self, path: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(build_request("POST", path, cookie, Some(body), false))
            .await
    }

    /// Sign in and return the session cookie.
    ///
    /// # Panics
    ///
    /// Panics if the sign-in does not redirect to the catalog with a cookie.
    #[allow(clippy::unwrap_used)]
    pub async fn sign_in(&self, email: &str, password: &str) -> String {
        let body = format!("email={}&password={}", encode(email), encode(password));
        let response = self.post_form("/auth/login", &body, None).await;
        assert_eq!(location(response.headers()), Some("/catalog"));
        session_cookie(response.headers()).unwrap()
    }

    /// Sign in as the member created by [`with_member`](Self::with_member).
    pub async fn sign_in_member(&self) -> String {
        self.sign_in(MEMBER_EMAIL, MEMBER_PASSWORD).await
    }
}

#[allow(clippy::unwrap_used)]
fn build_request(
    method: &str,
    path: &str,
    cookie: Option<&str>,
    form: Option<&str>,
    htmx: bool,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if htmx {
        builder = builder.header("hx-request", "true");
    }
    let body = match form {
        Some(form) => {
            builder = builder.header(
                header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            );
            Body::from(form.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

/// Minimal form encoding for test values.
#[must_use]
pub fn encode(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('+', "%2B")
        .replace('&', "%26")
        .replace('=', "%3D")
        .replace('@', "%40")
        .replace(' ', "+")
}

/// The `name=value` pair of the session cookie set by a response.
#[must_use]
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| pair.starts_with(&format!("{SESSION_COOKIE_NAME}=")))
        .map(str::to_string)
}

/// The `Location` header, if any.
#[must_use]
pub fn location(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

/// Read the whole body as text.
///
/// # Panics
///
/// Panics if the body is not UTF-8 or does not finish within five seconds.
#[allow(clippy::unwrap_used)]
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = tokio::time::timeout(
        Duration::from_secs(5),
        axum::body::to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .unwrap()
    .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
