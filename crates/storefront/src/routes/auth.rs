//! Authentication route handlers.
//!
//! Handles sign-in, registration and sign-out against the backend's auth
//! service. Successful sign-in or sign-up stores the backend session in the
//! browser session and announces it on the session hub.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{LOGIN_PATH, OptionalSession, clear_current_session, set_current_session};
use crate::models::{CurrentSession, session_keys};
use crate::services::{
    Backoff, RegistrationFlow, RegistrationForm, RegistrationOutcome, SessionEvent,
};
use crate::state::AppState;
use crate::supabase::{AuthSession, SignUp};

/// Where signed-in visitors land.
pub const HOME_PATH: &str = "/catalog";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Known `?success=` codes.
fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "confirm_email" => Some("Account created. Check your email to confirm it, then sign in."),
        "signed_out" => Some("You have been signed out."),
        _ => None,
    }
}

/// Known `?error=` codes.
fn error_message(code: &str) -> Option<&'static str> {
    match code {
        "session" => Some("Your session could not be saved. Please try again."),
        _ => None,
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate, Default)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub email: String,
}

/// Register page template.
#[derive(Template, WebTemplate, Default)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub error: Option<String>,
    pub email: String,
    pub full_name: String,
    pub phone: String,
}

impl RegisterTemplate {
    /// Re-render the form with an error, keeping everything but passwords.
    fn with_error(form: &RegistrationForm, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            email: form.email.clone(),
            full_name: form.full_name.clone(),
            phone: form.phone.clone(),
        }
    }
}

/// Message for a rate-limited sign-up.
fn rate_limited_message(wait: std::time::Duration) -> String {
    let seconds = wait.as_secs().max(1);
    format!("Too many sign-up attempts. Please wait {seconds} seconds before trying again.")
}

/// Store a new sign-in and tell its listeners.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
async fn start_session(
    state: &AppState,
    session: &Session,
    auth: AuthSession,
) -> Result<CurrentSession, tower_sessions::session::Error> {
    let current = CurrentSession::new(auth);
    // New id for the new privilege level
    session.cycle_id().await?;
    set_current_session(session, &current).await?;
    state
        .session_hub()
        .publish(current.gate_key, SessionEvent::SignedIn);
    set_sentry_user(&current.user_id, current.email.as_deref());
    Ok(current)
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    OptionalSession(current): OptionalSession,
    Query(query): Query<MessageQuery>,
) -> Response {
    if current.is_some() {
        return Redirect::to(HOME_PATH).into_response();
    }

    LoginTemplate {
        error: query.error.as_deref().and_then(error_message).map(String::from),
        success: query
            .success
            .as_deref()
            .and_then(success_message)
            .map(String::from),
        email: String::new(),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let email = form.email.trim();

    match state.gateway().sign_in(email, &form.password).await {
        Ok(auth) => match start_session(&state, &session, auth).await {
            Ok(current) => {
                tracing::info!(user_id = %current.user_id, "Signed in");
                add_breadcrumb("auth", "Signed in", None);
                Redirect::to(HOME_PATH).into_response()
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to store session after sign-in");
                Redirect::to("/auth/login?error=session").into_response()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Sign-in failed");
            let error = if e.is_invalid_credentials() {
                "Invalid email or password.".to_string()
            } else {
                e.to_string()
            };
            LoginTemplate {
                error: Some(error),
                success: None,
                email: email.to_string(),
            }
            .into_response()
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(OptionalSession(current): OptionalSession) -> Response {
    if current.is_some() {
        return Redirect::to(HOME_PATH).into_response();
    }
    RegisterTemplate::default().into_response()
}

/// Handle registration form submission.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegistrationForm>,
) -> Response {
    let mut backoff: Backoff = session
        .get(session_keys::SIGNUP_BACKOFF)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read sign-up backoff");
            None
        })
        .unwrap_or_default();

    let outcome = RegistrationFlow::new(state.gateway(), state.config().signup)
        .run(&form, &mut backoff)
        .await;

    if let Err(e) = session.insert(session_keys::SIGNUP_BACKOFF, backoff).await {
        tracing::warn!(error = %e, "Failed to store sign-up backoff");
    }

    match outcome {
        RegistrationOutcome::Registered(SignUp::Session(auth)) => {
            match start_session(&state, &session, auth).await {
                Ok(_) => {
                    add_breadcrumb("auth", "Registered", None);
                    Redirect::to(HOME_PATH).into_response()
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to store session after sign-up");
                    Redirect::to("/auth/login?error=session").into_response()
                }
            }
        }
        RegistrationOutcome::Registered(SignUp::ConfirmationRequired(_)) => {
            Redirect::to("/auth/login?success=confirm_email").into_response()
        }
        RegistrationOutcome::Invalid(e) => RegisterTemplate::with_error(&form, e.to_string()).into_response(),
        RegistrationOutcome::RateLimited { next_delay } => {
            RegisterTemplate::with_error(&form, rate_limited_message(next_delay)).into_response()
        }
        RegistrationOutcome::AlreadyRegistered => RegisterTemplate::with_error(
            &form,
            "This email is already registered. Please sign in instead.",
        )
        .into_response(),
        RegistrationOutcome::Failed(message) => {
            RegisterTemplate::with_error(&form, message).into_response()
        }
        RegistrationOutcome::ProfileFailed => RegisterTemplate::with_error(
            &form,
            "Your account was created, but we could not save your profile. Please contact us.",
        )
        .into_response(),
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
///
/// Backend sign-out is best effort; the local session is cleared regardless
/// and open pages of this sign-in are told to leave.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalSession(current): OptionalSession,
) -> Response {
    if let Some(current) = current {
        if let Err(e) = state.gateway().sign_out(&current.access_token).await {
            tracing::warn!(error = %e, "Backend sign-out failed");
        }
        if let Err(e) = clear_current_session(&session).await {
            tracing::error!(error = %e, "Failed to clear session");
        }
        state
            .session_hub()
            .publish(current.gate_key, SessionEvent::SignedOut);
        tracing::info!(user_id = %current.user_id, "Signed out");
    }
    clear_sentry_user();

    Redirect::to(LOGIN_PATH).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_message_codes() {
        assert!(success_message("confirm_email").is_some());
        assert!(success_message("<script>").is_none());
        assert!(error_message("session").is_some());
        assert!(error_message("anything").is_none());
    }

    #[test]
    fn test_rate_limited_message_rounds_up_to_a_second() {
        assert!(rate_limited_message(Duration::from_millis(2000)).contains("wait 2 seconds"));
        assert!(rate_limited_message(Duration::from_millis(10)).contains("wait 1 seconds"));
    }

    #[test]
    fn test_register_error_keeps_fields_but_not_passwords() {
        let form = RegistrationForm {
            email: "rider@example.kz".to_string(),
            password: "secret1".to_string(),
            password_confirm: "secret2".to_string(),
            full_name: "Aidar".to_string(),
            phone: "+7 700 000 00 00".to_string(),
        };
        let page = RegisterTemplate::with_error(&form, "Passwords do not match");
        assert_eq!(page.email, "rider@example.kz");
        assert_eq!(page.full_name, "Aidar");
        let html = page.render().unwrap_or_default();
        assert!(html.contains("Passwords do not match"));
        assert!(!html.contains("secret1"));
    }
}
