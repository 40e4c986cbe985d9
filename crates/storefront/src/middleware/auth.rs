//! Session gate extractors.
//!
//! [`RequireSession`] decides, on every request to a protected page, whether
//! the page renders or the visitor is sent to sign in. An expired access
//! token is refreshed through the backend first; if that fails the stored
//! session is cleared and listeners for the sign-in are told it ended.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tower_sessions::Session;

use crate::config::SessionFailureMode;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::models::{CurrentSession, session_keys};
use crate::services::SessionEvent;
use crate::state::AppState;

/// Where signed-out visitors are sent.
pub const LOGIN_PATH: &str = "/auth/login";

/// Whether the request was issued by HTMX.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .is_some_and(|value| value.as_bytes() == b"true")
}

/// Extractor that requires a signed-in visitor.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireSession(current): RequireSession,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", current.user_id)
/// }
/// ```
pub struct RequireSession(pub CurrentSession);

/// Why a protected request was not served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Redirect to the login page (full page requests).
    RedirectToLogin,
    /// Ask HTMX to navigate to the login page.
    HtmxRedirect,
    /// The session store failed and the configuration says to show it.
    Unavailable,
}

impl AuthRejection {
    const fn signed_out(htmx: bool) -> Self {
        if htmx {
            Self::HtmxRedirect
        } else {
            Self::RedirectToLogin
        }
    }

    const fn store_failure(mode: SessionFailureMode, htmx: bool) -> Self {
        match mode {
            SessionFailureMode::Redirect => Self::signed_out(htmx),
            SessionFailureMode::Error => Self::Unavailable,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::HtmxRedirect => (
                StatusCode::OK,
                [("hx-redirect", HeaderValue::from_static(LOGIN_PATH))],
            )
                .into_response(),
            Self::Unavailable => {
                AppError::Unavailable("session store".to_string()).into_response()
            }
        }
    }
}

impl FromRequestParts<AppState> for RequireSession {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let htmx = is_htmx(&parts.headers);
        let mode = state.config().session_failure_mode;

        // Get the session from extensions (set by SessionManagerLayer)
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            tracing::error!("Session layer is not installed");
            return Err(AuthRejection::store_failure(mode, htmx));
        };

        let current = match state.session_hub().current(&session).await {
            Ok(Some(current)) => current,
            Ok(None) => return Err(AuthRejection::signed_out(htmx)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read session");
                return Err(AuthRejection::store_failure(mode, htmx));
            }
        };

        if !current.is_expired(Utc::now()) {
            set_sentry_user(&current.user_id, current.email.as_deref());
            return Ok(Self(current));
        }

        match state.gateway().refresh(&current.refresh_token).await {
            Ok(fresh) => {
                let renewed = current.refreshed(fresh);
                if let Err(e) = set_current_session(&session, &renewed).await {
                    tracing::error!(error = %e, "Failed to store refreshed session");
                    return Err(AuthRejection::store_failure(mode, htmx));
                }
                state
                    .session_hub()
                    .publish(renewed.gate_key, SessionEvent::TokenRefreshed);
                tracing::debug!(user_id = %renewed.user_id, "Access token refreshed");
                set_sentry_user(&renewed.user_id, renewed.email.as_deref());
                Ok(Self(renewed))
            }
            Err(e) => {
                tracing::info!(error = %e, user_id = %current.user_id, "Session refresh failed, signing out");
                if let Err(e) = clear_current_session(&session).await {
                    tracing::error!(error = %e, "Failed to clear expired session");
                }
                state
                    .session_hub()
                    .publish(current.gate_key, SessionEvent::SignedOut);
                clear_sentry_user();
                Err(AuthRejection::signed_out(htmx))
            }
        }
    }
}

/// Extractor that optionally gets the stored session, without refreshing it.
///
/// Unlike `RequireSession`, this does not reject the request if nobody is
/// signed in.
pub struct OptionalSession(pub Option<CurrentSession>);

impl<S> FromRequestParts<S> for OptionalSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let current = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentSession>(session_keys::CURRENT_SESSION)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Failed to read session; treating as signed out");
                    None
                }),
            None => None,
        };

        Ok(Self(current))
    }
}

/// Helper to store the signed-in session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_session(
    session: &Session,
    current: &CurrentSession,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_SESSION, current).await
}

/// Helper to clear the signed-in session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentSession>(session_keys::CURRENT_SESSION)
        .await?;
    Ok(())
}
