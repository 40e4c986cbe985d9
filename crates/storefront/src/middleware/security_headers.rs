//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Adds restrictive security headers to all responses. The policy is built
//! once at start-up because the image and connect sources depend on the
//! configured backend host.

use axum::{
    extract::{Request, State},
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};
use url::Url;

/// Where the HTMX script is loaded from.
pub const HTMX_ORIGIN: &str = "https://unpkg.com";

/// Precomputed header values.
#[derive(Clone)]
pub struct SecurityHeaders {
    csp: HeaderValue,
}

impl SecurityHeaders {
    /// Build the policy for a backend at `backend_url`.
    ///
    /// Catalog images are served from the backend's storage, so its origin is
    /// allowed for images.
    #[must_use]
    pub fn new(backend_url: &Url) -> Self {
        let backend = backend_url.origin().ascii_serialization();
        let policy = content_security_policy(&backend);
        let csp = HeaderValue::from_str(&policy).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Backend origin not usable in CSP, images limited to self");
            HeaderValue::from_static(FALLBACK_CSP)
        });
        Self { csp }
    }
}

const FALLBACK_CSP: &str = "default-src 'none'; script-src 'self' https://unpkg.com; \
     style-src 'self'; img-src 'self'; connect-src 'self'; object-src 'none'; \
     base-uri 'self'; form-action 'self'; frame-ancestors 'none'";

fn content_security_policy(backend_origin: &str) -> String {
    format!(
        "default-src 'none'; \
         script-src 'self' {HTMX_ORIGIN}; \
         style-src 'self'; \
         font-src 'self'; \
         img-src 'self' {backend_origin}; \
         connect-src 'self'; \
         frame-src 'none'; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self'; \
         frame-ancestors 'none'"
    )
}

/// Add security headers to all responses.
///
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: no-referrer`
/// - `Content-Security-Policy` (see [`SecurityHeaders::new`])
/// - `Permissions-Policy` denying sensors, camera, payment and similar
/// - `Cache-Control: no-store` unless the handler set one
/// - `Cross-Origin-Opener-Policy: same-origin`
/// - `Cross-Origin-Embedder-Policy: credentialless` (backend images carry no CORP header)
pub async fn security_headers_middleware(
    State(security): State<SecurityHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(CONTENT_SECURITY_POLICY, security.csp.clone());

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), \
             camera=(), \
             display-capture=(), \
             geolocation=(), \
             gyroscope=(), \
             magnetometer=(), \
             microphone=(), \
             payment=(), \
             usb=(), \
             xr-spatial-tracking=()",
        ),
    );

    // Pages show per-user state; static files set their own policy
    headers
        .entry(CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store, max-age=0"));

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("credentialless"),
    );

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_allows_backend_images_and_htmx() {
        let url = Url::parse("https://abc.supabase.co/").unwrap();
        let headers = SecurityHeaders::new(&url);
        let csp = headers.csp.to_str().unwrap();
        assert!(csp.contains("img-src 'self' https://abc.supabase.co;"));
        assert!(csp.contains("script-src 'self' https://unpkg.com;"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }
}
