//! Auth payloads exchanged with the backend's `/auth/v1` endpoints.

use azmotos_core::UserId;
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::Deserialize;

/// The authenticated subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
}

/// A signed-in session issued by the auth service.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: AuthUser,
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Whether the access token has expired (or will within `leeway`).
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        self.expires_at <= now + leeway
    }
}

/// Result of a successful sign-up.
#[derive(Debug, Clone)]
pub enum SignUp {
    /// The account is active and signed in.
    Session(AuthSession),
    /// The account exists but the address must be confirmed before sign-in.
    ConfirmationRequired(AuthUser),
}

impl SignUp {
    /// The created account.
    #[must_use]
    pub const fn user(&self) -> &AuthUser {
        match self {
            Self::Session(session) => &session.user,
            Self::ConfirmationRequired(user) => user,
        }
    }
}

// =============================================================================
// Wire formats
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct RawUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    /// Empty for an address that was already registered (the service hides
    /// the conflict and returns a fake user).
    #[serde(default)]
    pub identities: Option<Vec<serde_json::Value>>,
}

impl From<RawUser> for AuthUser {
    fn from(raw: RawUser) -> Self {
        Self {
            id: raw.id,
            email: raw.email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: RawUser,
}

/// Access tokens without an explicit lifetime are treated as valid for an hour.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

impl RawTokenResponse {
    pub(crate) fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| {
                now + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS))
            });

        AuthSession {
            user: self.user.into(),
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at,
        }
    }
}
