//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP, frame and referrer policy)
//! 5. Session layer (tower-sessions with in-memory store)
//! 6. Rate limiting on form posts (governor)
//!
//! The session gate itself is an extractor ([`RequireSession`]) so each
//! protected handler states its requirement in its signature.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    AuthRejection, LOGIN_PATH, OptionalSession, RequireSession, clear_current_session, is_htmx,
    set_current_session,
};
pub use rate_limit::{auth_rate_limiter, form_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::{SecurityHeaders, security_headers_middleware};
pub use session::create_session_layer;
