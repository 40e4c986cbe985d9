//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. Handlers that have no better page to show return
//! `Result<T, AppError>`; the response is the shared error page.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::filters;
use crate::supabase::GatewayError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend call failed.
    #[error("Backend error: {0}")]
    Gateway(#[from] GatewayError),

    /// Session store could not be read or written.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A dependency is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Gateway(GatewayError::NotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gateway(GatewayError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::Session(_) | Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the visitor.
    fn public_message(&self) -> String {
        match self {
            Self::Gateway(GatewayError::NotFound(_)) => "Not found".to_string(),
            Self::Gateway(_) => "The catalog service is not responding. Please try again.".to_string(),
            Self::Session(_) | Self::Unavailable(_) => {
                "Your session could not be loaded. Please try again shortly.".to_string()
            }
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Shared error page.
#[derive(Template)]
#[template(path = "errors/error.html")]
pub struct ErrorTemplate {
    pub status: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.status().is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        // Don't expose internal error details to clients
        let message = self.public_message();

        let page = ErrorTemplate {
            status: status.as_u16(),
            message,
        };
        match page.render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to render error page");
                (status, page.message).into_response()
            }
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("catalog", "Filtered catalog", Some(&[("brand", "Honda")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("motorcycle".to_string());
        assert_eq!(err.to_string(), "Not found: motorcycle");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Unavailable("store".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_gateway_errors_map_to_upstream_statuses() {
        assert_eq!(
            get_status(GatewayError::api(500, None, "boom").into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(GatewayError::Timeout.into()),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            get_status(GatewayError::NotFound("row".to_string()).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Internal("connection string leaked".to_string());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::from(GatewayError::api(500, None, "relation does not exist"));
        assert!(!err.public_message().contains("relation"));
    }
}
