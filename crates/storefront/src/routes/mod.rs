//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Backend reachability check
//!
//! # Catalog (requires session)
//! GET  /                       - Catalog page
//! GET  /catalog                - Catalog page (?brand=&q=&filters=open)
//! GET  /catalog/results        - Results fragment (HTMX, ?view=)
//! GET  /motorcycle/{id}        - Motorcycle detail
//! GET  /motorcycle[/]          - No id: not found
//!
//! # Contact (requires session)
//! GET  /contact                - Contact page
//! POST /contact                - Send a message
//!
//! # Session
//! GET  /session/events         - Session change stream (SSE)
//!
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action (rate limited)
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action (rate limited)
//! POST /auth/logout            - Logout action
//! ```

pub mod auth;
pub mod catalog;
pub mod contact;
pub mod health;
pub mod motorcycle;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, form_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            post(auth::login)
                .route_layer(auth_rate_limiter())
                .get(auth::login_page),
        )
        .route(
            "/register",
            post(auth::register)
                .route_layer(auth_rate_limiter())
                .get(auth::register_page),
        )
        .route("/logout", post(auth::logout))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::index))
        .route("/catalog", get(catalog::index))
        .route("/catalog/results", get(catalog::results))
        .route("/motorcycle", get(motorcycle::missing))
        .route("/motorcycle/", get(motorcycle::missing))
        .route("/motorcycle/{id}", get(motorcycle::show))
        .route(
            "/contact",
            post(contact::submit)
                .route_layer(form_rate_limiter())
                .get(contact::page),
        )
        .route("/session/events", get(session::events))
        .nest("/auth", auth_routes())
}
