//! Request ID middleware for request tracing and correlation.
//!
//! Every request gets an id: the upstream proxy's `x-request-id` when it looks
//! sane, otherwise a fresh UUID v4. The id is recorded on the tracing span,
//! tagged on the Sentry scope, and echoed in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream id accepted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Accept an upstream id only if it is short and printable.
fn upstream_id(value: &HeaderValue) -> Option<&str> {
    let id = value.to_str().ok()?.trim();
    let ok = !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'));
    ok.then_some(id)
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(upstream_id)
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_accepted() {
        let value = HeaderValue::from_static("8a1f3c-cf-ray:FRA");
        assert_eq!(upstream_id(&value), Some("8a1f3c-cf-ray:FRA"));
    }

    #[test]
    fn test_upstream_id_rejected() {
        assert_eq!(upstream_id(&HeaderValue::from_static("")), None);
        assert_eq!(upstream_id(&HeaderValue::from_static("a b")), None);
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        assert_eq!(upstream_id(&HeaderValue::from_str(&long).unwrap()), None);
    }
}
