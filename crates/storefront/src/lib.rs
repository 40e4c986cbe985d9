//! AZMOTOS Storefront library.
//!
//! This crate provides the storefront as a library so the binary, the CLI
//! and the integration tests share one router and one backend client.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod supabase;

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request, header::CACHE_CONTROL},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::{
    services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use middleware::{SecurityHeaders, request_id_middleware, security_headers_middleware};
use state::AppState;

/// Build the complete application: routes, static files, and middleware.
pub fn app(state: AppState) -> Router {
    let security = SecurityHeaders::new(&state.config().supabase.url);
    let session_layer = middleware::create_session_layer(state.config());
    let static_files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=86400"),
        ))
        .service(ServeDir::new(&state.config().static_dir));

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/health/ready", get(routes::health::readiness))
        .merge(routes::routes())
        .nest_service("/static", static_files)
        .layer(session_layer)
        .layer(axum::middleware::from_fn_with_state(
            security,
            security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
