//! Account registration.
//!
//! Registration is two remote calls with no transaction around them: create
//! the auth account, then insert its `profiles` row. If the second call fails
//! the account exists without a profile; the caller reports a profile error
//! and nothing is rolled back.
//!
//! Rate-limited sign-ups bump a retry counter kept in the browser session.
//! The next submission first waits `min(base * 2^retries, cap)`; nothing is
//! retried automatically.

use std::time::Duration;

use azmotos_core::{Email, NewProfile};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::SignupConfig;
use crate::supabase::{Gateway, SignUp};

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Registration form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
}

/// Problems detected before contacting the backend.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
}

impl RegistrationForm {
    /// Check the passwords locally.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: mismatch, then length.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.password != self.password_confirm {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LENGTH,
            });
        }
        Ok(())
    }

    /// The address as sent to the backend: normalized when it parses,
    /// otherwise trimmed and left for the backend to judge.
    #[must_use]
    pub fn email(&self) -> String {
        Email::parse(&self.email)
            .map_or_else(|_| self.email.trim().to_string(), Email::into_inner)
    }
}

/// Rate-limit backoff state, stored per browser session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backoff {
    pub retry_count: u32,
}

impl Backoff {
    /// `min(base * 2^retry_count, cap)`, saturating at `cap`.
    #[must_use]
    pub fn delay(self, base: Duration, cap: Duration) -> Duration {
        1u32.checked_shl(self.retry_count)
            .and_then(|factor| base.checked_mul(factor))
            .map_or(cap, |delay| delay.min(cap))
    }

    /// The wait owed before the next attempt, if any attempt was rate limited.
    #[must_use]
    pub fn pending_delay(self, base: Duration, cap: Duration) -> Option<Duration> {
        (self.retry_count > 0).then(|| self.delay(base, cap))
    }

    pub const fn record_rate_limit(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1);
    }

    pub const fn reset(&mut self) {
        self.retry_count = 0;
    }
}

/// How a registration attempt ended.
#[derive(Debug)]
pub enum RegistrationOutcome {
    /// Account and profile exist. Either signed in, or waiting for the
    /// address to be confirmed.
    Registered(SignUp),
    /// Rejected locally; the backend was not contacted.
    Invalid(ValidationError),
    /// The backend's sign-up rate limit was hit.
    RateLimited { next_delay: Duration },
    AlreadyRegistered,
    /// Any other backend error, with the backend's message.
    Failed(String),
    /// The account was created but its profile row was not.
    ProfileFailed,
}

/// The sign-up then profile-insert sequence.
pub struct RegistrationFlow<'a> {
    gateway: &'a dyn Gateway,
    config: SignupConfig,
}

impl<'a> RegistrationFlow<'a> {
    #[must_use]
    pub const fn new(gateway: &'a dyn Gateway, config: SignupConfig) -> Self {
        Self { gateway, config }
    }

    /// Run one registration attempt, updating `backoff`.
    #[instrument(skip_all)]
    pub async fn run(&self, form: &RegistrationForm, backoff: &mut Backoff) -> RegistrationOutcome {
        if let Err(e) = form.validate() {
            return RegistrationOutcome::Invalid(e);
        }

        if let Some(wait) = backoff.pending_delay(self.config.backoff_base, self.config.backoff_cap)
        {
            tracing::info!(
                retry_count = backoff.retry_count,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "Waiting before sign-up after rate limit"
            );
            tokio::time::sleep(wait).await;
        }

        let email = form.email();
        let signed_up = match self.gateway.sign_up(&email, &form.password).await {
            Ok(signed_up) => signed_up,
            Err(e) if e.is_already_registered() => {
                tracing::info!("Sign-up for an existing account");
                return RegistrationOutcome::AlreadyRegistered;
            }
            Err(e) if e.is_rate_limited() => {
                backoff.record_rate_limit();
                let next_delay = backoff.delay(self.config.backoff_base, self.config.backoff_cap);
                tracing::warn!(retry_count = backoff.retry_count, "Sign-up rate limited");
                return RegistrationOutcome::RateLimited { next_delay };
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sign-up failed");
                return RegistrationOutcome::Failed(e.to_string());
            }
        };
        backoff.reset();

        // Give the new session time to propagate before writing under it
        tokio::time::sleep(self.config.profile_settle_delay).await;

        let token = match &signed_up {
            SignUp::Session(session) => Some(&session.access_token),
            SignUp::ConfirmationRequired(_) => None,
        };
        let profile = NewProfile::new(signed_up.user().id, &email, &form.full_name, &form.phone);

        if let Err(e) = self.gateway.insert_profile(&profile, token).await {
            tracing::error!(
                error = %e,
                user_id = %profile.id,
                "Account created but profile insert failed"
            );
            return RegistrationOutcome::ProfileFailed;
        }

        tracing::info!(user_id = %profile.id, "Account registered");
        RegistrationOutcome::Registered(signed_up)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::supabase::{FakeGateway, tables};

    const SECOND: Duration = Duration::from_secs(1);
    const MINUTE: Duration = Duration::from_secs(60);

    fn form(password: &str, confirm: &str) -> RegistrationForm {
        RegistrationForm {
            email: " Rider@Example.KZ ".to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
            full_name: "Aidar Nurlanov".to_string(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let delay = |retry_count| Backoff { retry_count }.delay(SECOND, MINUTE);
        assert_eq!(delay(0), SECOND);
        assert_eq!(delay(1), 2 * SECOND);
        assert_eq!(delay(5), 32 * SECOND);
        assert_eq!(delay(6), MINUTE);
        assert_eq!(delay(31), MINUTE);
        assert_eq!(delay(32), MINUTE);
        assert_eq!(delay(u32::MAX), MINUTE);
    }

    #[test]
    fn test_no_wait_before_first_attempt() {
        assert_eq!(Backoff::default().pending_delay(SECOND, MINUTE), None);
        let mut backoff = Backoff::default();
        backoff.record_rate_limit();
        assert_eq!(backoff.pending_delay(SECOND, MINUTE), Some(2 * SECOND));
    }

    #[test]
    fn test_record_rate_limit_saturates() {
        let mut backoff = Backoff {
            retry_count: u32::MAX,
        };
        backoff.record_rate_limit();
        assert_eq!(backoff.retry_count, u32::MAX);
    }

    #[test]
    fn test_validation_order() {
        assert_eq!(
            form("abc", "abd").validate(),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(
            form("abc", "abc").validate(),
            Err(ValidationError::PasswordTooShort { min: 6 })
        );
        assert_eq!(form("abcdef", "abcdef").validate(), Ok(()));
        // six characters, more than six bytes
        assert_eq!(form("пароль", "пароль").validate(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_input_never_calls_backend() {
        let gateway = FakeGateway::new();
        let flow = RegistrationFlow::new(&gateway, SignupConfig::default());
        let mut backoff = Backoff::default();

        let outcome = flow.run(&form("secret1", "secret2"), &mut backoff).await;
        assert!(matches!(
            outcome,
            RegistrationOutcome::Invalid(ValidationError::PasswordMismatch)
        ));
        let outcome = flow.run(&form("12345", "12345"), &mut backoff).await;
        assert!(matches!(
            outcome,
            RegistrationOutcome::Invalid(ValidationError::PasswordTooShort { .. })
        ));
        assert_eq!(gateway.calls().sign_up, 0);
        assert_eq!(gateway.calls().insert_row, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_creates_profile_and_resets_backoff() {
        let gateway = FakeGateway::new();
        let flow = RegistrationFlow::new(&gateway, SignupConfig::default());
        let mut backoff = Backoff { retry_count: 2 };

        let started = tokio::time::Instant::now();
        let outcome = flow.run(&form("secret1", "secret1"), &mut backoff).await;

        assert!(matches!(
            outcome,
            RegistrationOutcome::Registered(SignUp::Session(_))
        ));
        assert_eq!(backoff, Backoff::default());
        // 4 s backoff for two prior rate limits, then the 1 s settle delay
        assert!(started.elapsed() >= 5 * SECOND);

        let profiles = gateway.rows(tables::PROFILES);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0]["email"], "rider@example.kz");
        assert_eq!(profiles[0]["full_name"], "Aidar Nurlanov");
        assert!(profiles[0]["phone"].is_null());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_increments_once_per_attempt() {
        let gateway = FakeGateway::new();
        gateway.rate_limit_sign_ups(2);
        let flow = RegistrationFlow::new(&gateway, SignupConfig::default());
        let mut backoff = Backoff::default();

        let outcome = flow.run(&form("secret1", "secret1"), &mut backoff).await;
        assert!(matches!(
            outcome,
            RegistrationOutcome::RateLimited { next_delay } if next_delay == 2 * SECOND
        ));
        assert_eq!(backoff.retry_count, 1);

        let outcome = flow.run(&form("secret1", "secret1"), &mut backoff).await;
        assert!(matches!(
            outcome,
            RegistrationOutcome::RateLimited { next_delay } if next_delay == 4 * SECOND
        ));
        assert_eq!(backoff.retry_count, 2);
        assert_eq!(gateway.calls().sign_up, 2);
        assert_eq!(gateway.calls().insert_row, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_registered() {
        let gateway = FakeGateway::new();
        gateway.add_user("rider@example.kz", "whatever");
        let flow = RegistrationFlow::new(&gateway, SignupConfig::default());

        let outcome = flow
            .run(&form("secret1", "secret1"), &mut Backoff::default())
            .await;
        assert!(matches!(outcome, RegistrationOutcome::AlreadyRegistered));
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_failure_leaves_account() {
        let gateway = FakeGateway::new();
        gateway.fail_inserts_into(tables::PROFILES);
        let flow = RegistrationFlow::new(&gateway, SignupConfig::default());

        let outcome = flow
            .run(&form("secret1", "secret1"), &mut Backoff::default())
            .await;
        assert!(matches!(outcome, RegistrationOutcome::ProfileFailed));
        assert!(gateway.has_user("rider@example.kz"));
        assert!(gateway.rows(tables::PROFILES).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_pending_still_inserts_profile() {
        let gateway = FakeGateway::new();
        gateway.require_email_confirmation(true);
        let flow = RegistrationFlow::new(&gateway, SignupConfig::default());

        let outcome = flow
            .run(&form("secret1", "secret1"), &mut Backoff::default())
            .await;
        assert!(matches!(
            outcome,
            RegistrationOutcome::Registered(SignUp::ConfirmationRequired(_))
        ));
        assert_eq!(gateway.rows(tables::PROFILES).len(), 1);
    }
}
