//! Client for the hosted backend (Supabase-compatible auth and tables).
//!
//! # Architecture
//!
//! - [`Gateway`] is the consumed contract: sign up, sign in, refresh, sign
//!   out, and row select/lookup/insert. Handlers only ever see
//!   `Arc<dyn Gateway>`.
//! - [`SupabaseClient`] implements it over HTTP with `reqwest`: auth under
//!   `/auth/v1`, tables under `/rest/v1`.
//! - `FakeGateway` (tests and the `testing` feature) keeps users and tables
//!   in memory and evaluates [`RowQuery`] filters locally.
//! - The backend is the source of truth; nothing here caches rows.
//!
//! # Example
//!
//! ```rust,ignore
//! use azmotos_storefront::supabase::{Filter, RowQuery, tables};
//!
//! let query = RowQuery::new(tables::MOTORCYCLES).filter(Filter::eq("brand", "Honda"));
//! let bikes = gateway.fetch_motorcycles(&query, Some(&token)).await?;
//! ```

mod client;
#[cfg(any(test, feature = "testing"))]
mod fake;
mod query;
mod types;

pub use client::SupabaseClient;
#[cfg(any(test, feature = "testing"))]
pub use fake::FakeGateway;
pub use query::{Filter, RowQuery};
pub use types::{AuthSession, AuthUser, SignUp};

use async_trait::async_trait;
use azmotos_core::{Motorcycle, MotorcycleId, NewProfile};
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

/// Table names in the backend.
pub mod tables {
    pub const MOTORCYCLES: &str = "motorcycles";
    pub const PROFILES: &str = "profiles";
    pub const CONTACT_MESSAGES: &str = "contact_messages";
}

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The configured request timeout elapsed.
    #[error("request to the backend timed out")]
    Timeout,

    /// The backend answered with an error. Displays the service's message
    /// verbatim.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint URL could not be built.
    #[error("invalid backend URL: {0}")]
    Url(#[from] url::ParseError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

impl GatewayError {
    /// Build an API error from a status and whatever error body the service
    /// returned.
    ///
    /// Auth endpoints answer `{"error_code", "msg"}`, `{"code", "msg"}` or the
    /// OAuth shape `{"error", "error_description"}`; table endpoints answer
    /// `{"code", "message"}`. A body that is not JSON becomes the message.
    #[must_use]
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let json: Option<Value> = serde_json::from_str(body).ok();
        let field = |key: &str| {
            json.as_ref()
                .and_then(|v| v.get(key))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let code = field("error_code")
            .or_else(|| field("code"))
            .or_else(|| field("error_description").and_then(|_| field("error")));
        let message = field("msg")
            .or_else(|| field("message"))
            .or_else(|| field("error_description"))
            .or_else(|| field("error"))
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty() && json.is_none())
                    .then(|| trimmed.chars().take(200).collect())
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });

        Self::Api {
            status: status.as_u16(),
            code,
            message,
        }
    }

    /// Build an API error directly.
    pub fn api(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.map(String::from),
            message: message.into(),
        }
    }

    /// The sign-up email quota or a request rate limit was hit.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Api {
                status,
                code,
                message,
            } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || code.as_deref().is_some_and(|c| c.contains("rate_limit"))
                    || message.contains("over_email_send_rate_limit")
                    || message.to_lowercase().contains("rate limit")
            }
            _ => false,
        }
    }

    /// The email address already has an account.
    #[must_use]
    pub fn is_already_registered(&self) -> bool {
        match self {
            Self::Api { code, message, .. } => {
                matches!(code.as_deref(), Some("user_already_exists" | "email_exists"))
                    || message.contains("already registered")
            }
            _ => false,
        }
    }

    /// Email and password did not match an account.
    #[must_use]
    pub fn is_invalid_credentials(&self) -> bool {
        match self {
            Self::Api { code, message, .. } => {
                code.as_deref() == Some("invalid_credentials")
                    || message.contains("Invalid login credentials")
            }
            _ => false,
        }
    }
}

/// The hosted backend as seen by the storefront.
///
/// `token` arguments are the signed-in user's access token; `None` means the
/// request is made with the anon key only.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Create an account.
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, GatewayError>;

    /// Exchange email and password for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, GatewayError>;

    /// Exchange a refresh token for a fresh session.
    async fn refresh(&self, refresh_token: &SecretString) -> Result<AuthSession, GatewayError>;

    /// Revoke the session behind `access_token`.
    async fn sign_out(&self, access_token: &SecretString) -> Result<(), GatewayError>;

    /// Select rows, in the order the backend returns them.
    async fn query_rows(
        &self,
        query: &RowQuery,
        token: Option<&SecretString>,
    ) -> Result<Vec<Value>, GatewayError>;

    /// Look up one row by its `id` column.
    async fn get_row_by_id(
        &self,
        table: &str,
        id: &str,
        token: Option<&SecretString>,
    ) -> Result<Option<Value>, GatewayError>;

    /// Insert one row.
    async fn insert_row(
        &self,
        table: &str,
        row: &Value,
        token: Option<&SecretString>,
    ) -> Result<(), GatewayError>;

    /// Check that the backend is reachable.
    async fn health(&self) -> Result<(), GatewayError>;
}

impl<'g> dyn Gateway + 'g {
    /// Run a catalog query and decode the rows.
    ///
    /// Rows that fail to decode are logged and skipped so one bad record does
    /// not hide the rest of the catalog.
    ///
    /// # Errors
    ///
    /// Returns the gateway error if the query itself fails.
    #[instrument(skip(self, token), fields(table = query.table()))]
    pub async fn fetch_motorcycles(
        &self,
        query: &RowQuery,
        token: Option<&SecretString>,
    ) -> Result<Vec<Motorcycle>, GatewayError> {
        let rows = self.query_rows(query, token).await?;
        let total = rows.len();
        let bikes: Vec<Motorcycle> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(bike) => Some(bike),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed motorcycle row");
                    None
                }
            })
            .collect();
        tracing::debug!(total, decoded = bikes.len(), "Fetched motorcycles");
        Ok(bikes)
    }

    /// Look up one motorcycle.
    ///
    /// # Errors
    ///
    /// Returns the gateway error if the lookup fails or the row is malformed.
    #[instrument(skip(self, token))]
    pub async fn fetch_motorcycle(
        &self,
        id: MotorcycleId,
        token: Option<&SecretString>,
    ) -> Result<Option<Motorcycle>, GatewayError> {
        let row = self
            .get_row_by_id(tables::MOTORCYCLES, &id.to_string(), token)
            .await?;
        row.map(serde_json::from_value)
            .transpose()
            .map_err(GatewayError::from)
    }

    /// Insert the profile row for a new account.
    ///
    /// # Errors
    ///
    /// Returns the gateway error if the insert is rejected.
    #[instrument(skip(self, profile, token), fields(user_id = %profile.id))]
    pub async fn insert_profile(
        &self,
        profile: &NewProfile,
        token: Option<&SecretString>,
    ) -> Result<(), GatewayError> {
        let row = serde_json::to_value(profile)?;
        self.insert_row(tables::PROFILES, &row, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::NotFound("motorcycle".to_string());
        assert_eq!(err.to_string(), "Not found: motorcycle");
    }

    #[test]
    fn test_api_error_displays_message_verbatim() {
        let err = GatewayError::api(400, None, "Signup requires a valid password");
        assert_eq!(err.to_string(), "Signup requires a valid password");
    }

    #[test]
    fn test_from_response_auth_shape() {
        let err = GatewayError::from_response(
            StatusCode::BAD_REQUEST,
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        );
        assert!(err.is_invalid_credentials());
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[test]
    fn test_from_response_oauth_shape() {
        let err = GatewayError::from_response(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        match &err {
            GatewayError::Api { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("invalid_grant"));
                assert_eq!(message, "Invalid login credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_response_table_shape() {
        let err = GatewayError::from_response(
            StatusCode::CONFLICT,
            r#"{"code":"23505","details":null,"hint":null,"message":"duplicate key value"}"#,
        );
        match err {
            GatewayError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 409);
                assert_eq!(code.as_deref(), Some("23505"));
                assert_eq!(message, "duplicate key value");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_response_plain_text_and_empty() {
        let err = GatewayError::from_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.to_string(), "upstream down");

        let err = GatewayError::from_response(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.to_string(), "Service Unavailable");
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(GatewayError::api(429, None, "Too many requests").is_rate_limited());
        assert!(
            GatewayError::api(400, Some("over_email_send_rate_limit"), "Email rate limit exceeded")
                .is_rate_limited()
        );
        assert!(GatewayError::api(400, None, "over_email_send_rate_limit").is_rate_limited());
        assert!(!GatewayError::api(400, None, "Invalid email").is_rate_limited());
        assert!(!GatewayError::Timeout.is_rate_limited());
    }

    #[test]
    fn test_already_registered_classification() {
        assert!(
            GatewayError::api(422, Some("user_already_exists"), "User already registered")
                .is_already_registered()
        );
        assert!(GatewayError::api(400, None, "User already registered").is_already_registered());
        assert!(!GatewayError::api(400, None, "Invalid email").is_already_registered());
    }
}
