//! Session-related types.
//!
//! Types stored in the browser session for authentication state.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use azmotos_core::UserId;

use crate::supabase::AuthSession;

/// Access tokens this close to expiry are refreshed before use.
const EXPIRY_LEEWAY_SECONDS: i64 = 30;

/// Session-stored authentication state.
///
/// `gate_key` identifies this sign-in to the session hub. It survives token
/// refreshes and changes on every new sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentSession {
    pub user_id: UserId,
    pub email: Option<String>,
    #[serde(with = "secret_string")]
    pub access_token: SecretString,
    #[serde(with = "secret_string")]
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
    pub gate_key: Uuid,
}

impl CurrentSession {
    /// Wrap a freshly issued session with a new gate key.
    #[must_use]
    pub fn new(session: AuthSession) -> Self {
        Self::with_gate_key(session, Uuid::new_v4())
    }

    /// Replace the tokens, keeping the gate key.
    #[must_use]
    pub fn refreshed(&self, session: AuthSession) -> Self {
        Self::with_gate_key(session, self.gate_key)
    }

    fn with_gate_key(session: AuthSession, gate_key: Uuid) -> Self {
        Self {
            user_id: session.user.id,
            email: session.user.email,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
            gate_key,
        }
    }

    /// Whether the access token must be refreshed before use.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::seconds(EXPIRY_LEEWAY_SECONDS)
    }
}

/// Tokens are stored in the in-process session store only; the cookie carries
/// just the session id.
mod secret_string {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(secret.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in session.
    pub const CURRENT_SESSION: &str = "current_session";

    /// Key for the registration rate-limit backoff state.
    pub const SIGNUP_BACKOFF: &str = "signup_backoff";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::supabase::AuthUser;
    use secrecy::ExposeSecret;

    fn auth_session(access: &str, expires_at: DateTime<Utc>) -> AuthSession {
        AuthSession {
            user: AuthUser {
                id: UserId::new(Uuid::nil()),
                email: Some("rider@example.kz".to_string()),
            },
            access_token: SecretString::from(access.to_string()),
            refresh_token: SecretString::from("refresh".to_string()),
            expires_at,
        }
    }

    #[test]
    fn test_refresh_keeps_gate_key() {
        let now = Utc::now();
        let first = CurrentSession::new(auth_session("one", now));
        let second = first.refreshed(auth_session("two", now + Duration::hours(1)));

        assert_eq!(first.gate_key, second.gate_key);
        assert_eq!(second.access_token.expose_secret(), "two");
        assert_ne!(CurrentSession::new(auth_session("three", now)).gate_key, first.gate_key);
    }

    #[test]
    fn test_expiry_leeway() {
        let now = Utc::now();
        assert!(CurrentSession::new(auth_session("a", now + Duration::seconds(10))).is_expired(now));
        assert!(!CurrentSession::new(auth_session("a", now + Duration::minutes(5))).is_expired(now));
    }

    #[test]
    fn test_serde_roundtrip_keeps_tokens_and_debug_redacts() {
        let session = CurrentSession::new(auth_session("token-value", Utc::now()));
        let json = serde_json::to_string(&session).unwrap();
        let back: CurrentSession = serde_json::from_str(&json).unwrap();

        assert_eq!(back.access_token.expose_secret(), "token-value");
        assert!(!format!("{back:?}").contains("token-value"));
    }
}
