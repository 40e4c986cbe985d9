//! In-memory [`Gateway`] for tests.
//!
//! Users, sessions and tables live in a mutex-guarded map. Row queries are
//! evaluated with [`RowQuery::matches`], so filters behave the way they do
//! against the real service. Failures and delays can be injected per
//! operation, and every call is counted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use azmotos_core::UserId;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use uuid::Uuid;

use super::{AuthSession, AuthUser, Filter, Gateway, GatewayError, RowQuery, SignUp};

/// Number of calls made to each gateway operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub sign_up: usize,
    pub sign_in: usize,
    pub refresh: usize,
    pub sign_out: usize,
    pub query_rows: usize,
    pub get_row_by_id: usize,
    pub insert_row: usize,
}

#[derive(Default)]
struct Counters {
    sign_up: AtomicUsize,
    sign_in: AtomicUsize,
    refresh: AtomicUsize,
    sign_out: AtomicUsize,
    query_rows: AtomicUsize,
    get_row_by_id: AtomicUsize,
    insert_row: AtomicUsize,
}

struct FakeUser {
    id: UserId,
    password: String,
}

struct FakeState {
    users: HashMap<String, FakeUser>,
    tables: HashMap<String, Vec<Value>>,
    /// access token -> email
    access_tokens: HashMap<String, String>,
    /// refresh token -> email
    refresh_tokens: HashMap<String, String>,
    token_lifetime: chrono::Duration,
    rate_limited_sign_ups: u32,
    require_confirmation: bool,
    fail_queries: bool,
    fail_refresh: bool,
    unhealthy: bool,
    failing_tables: HashSet<String>,
    query_delays: VecDeque<Duration>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            users: HashMap::new(),
            tables: HashMap::new(),
            access_tokens: HashMap::new(),
            refresh_tokens: HashMap::new(),
            token_lifetime: chrono::Duration::hours(1),
            rate_limited_sign_ups: 0,
            require_confirmation: false,
            fail_queries: false,
            fail_refresh: false,
            unhealthy: false,
            failing_tables: HashSet::new(),
            query_delays: VecDeque::new(),
        }
    }
}

impl FakeState {
    fn issue_session(&mut self, email: &str, id: UserId) -> AuthSession {
        let access = Uuid::new_v4().to_string();
        let refresh = Uuid::new_v4().to_string();
        self.access_tokens.insert(access.clone(), email.to_string());
        self.refresh_tokens.insert(refresh.clone(), email.to_string());

        AuthSession {
            user: AuthUser {
                id,
                email: Some(email.to_string()),
            },
            access_token: SecretString::from(access),
            refresh_token: SecretString::from(refresh),
            expires_at: Utc::now() + self.token_lifetime,
        }
    }
}

/// In-memory stand-in for the hosted backend.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
    counters: Counters,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a table with rows.
    #[must_use]
    pub fn with_rows(self, table: &str, rows: impl IntoIterator<Item = Value>) -> Self {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
        self
    }

    /// Register an account that can sign in.
    pub fn add_user(&self, email: &str, password: &str) -> UserId {
        let id = UserId::new(Uuid::new_v4());
        self.state().users.insert(
            email.to_string(),
            FakeUser {
                id,
                password: password.to_string(),
            },
        );
        id
    }

    /// Answer the next `count` sign-ups with the email rate-limit error.
    pub fn rate_limit_sign_ups(&self, count: u32) {
        self.state().rate_limited_sign_ups = count;
    }

    /// Sign-ups return a user without a session.
    pub fn require_email_confirmation(&self, required: bool) {
        self.state().require_confirmation = required;
    }

    /// Make every row query fail.
    pub fn fail_queries(&self, fail: bool) {
        self.state().fail_queries = fail;
    }

    /// Make refresh-token exchanges fail.
    pub fn fail_refresh(&self, fail: bool) {
        self.state().fail_refresh = fail;
    }

    /// Make the health check fail.
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.state().unhealthy = unhealthy;
    }

    /// Reject inserts into `table`.
    pub fn fail_inserts_into(&self, table: &str) {
        self.state().failing_tables.insert(table.to_string());
    }

    /// Lifetime of issued access tokens. Zero or negative issues tokens that
    /// are already expired.
    pub fn set_token_lifetime(&self, lifetime: chrono::Duration) {
        self.state().token_lifetime = lifetime;
    }

    /// Delay the next row query by `delay` before it answers.
    pub fn delay_next_query(&self, delay: Duration) {
        self.state().query_delays.push_back(delay);
    }

    /// Current contents of a table.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Whether an account exists for `email`.
    #[must_use]
    pub fn has_user(&self, email: &str) -> bool {
        self.state().users.contains_key(email)
    }

    /// Whether `access_token` is still live.
    #[must_use]
    pub fn is_signed_in(&self, access_token: &SecretString) -> bool {
        self.state()
            .access_tokens
            .contains_key(access_token.expose_secret())
    }

    #[must_use]
    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            sign_up: c.sign_up.load(Ordering::SeqCst),
            sign_in: c.sign_in.load(Ordering::SeqCst),
            refresh: c.refresh.load(Ordering::SeqCst),
            sign_out: c.sign_out.load(Ordering::SeqCst),
            query_rows: c.query_rows.load(Ordering::SeqCst),
            get_row_by_id: c.get_row_by_id.load(Ordering::SeqCst),
            insert_row: c.insert_row.load(Ordering::SeqCst),
        }
    }

    async fn select(&self, query: &RowQuery) -> Result<Vec<Value>, GatewayError> {
        let delay = self.state().query_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if state.fail_queries {
            return Err(GatewayError::api(
                503,
                None,
                "upstream connect error or disconnect/reset before headers",
            ));
        }

        let rows = state
            .tables
            .get(query.table())
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.matches(row))
                    .take(query.limit_value().unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, GatewayError> {
        self.counters.sign_up.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();

        if state.rate_limited_sign_ups > 0 {
            state.rate_limited_sign_ups -= 1;
            return Err(GatewayError::api(
                429,
                Some("over_email_send_rate_limit"),
                "email rate limit exceeded",
            ));
        }
        if state.users.contains_key(email) {
            return Err(GatewayError::api(
                422,
                Some("user_already_exists"),
                "User already registered",
            ));
        }

        let id = UserId::new(Uuid::new_v4());
        state.users.insert(
            email.to_string(),
            FakeUser {
                id,
                password: password.to_string(),
            },
        );

        if state.require_confirmation {
            return Ok(SignUp::ConfirmationRequired(AuthUser {
                id,
                email: Some(email.to_string()),
            }));
        }
        Ok(SignUp::Session(state.issue_session(email, id)))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, GatewayError> {
        self.counters.sign_in.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();

        let id = match state.users.get(email) {
            Some(user) if user.password == password => user.id,
            _ => {
                return Err(GatewayError::api(
                    400,
                    Some("invalid_credentials"),
                    "Invalid login credentials",
                ));
            }
        };
        Ok(state.issue_session(email, id))
    }

    async fn refresh(&self, refresh_token: &SecretString) -> Result<AuthSession, GatewayError> {
        self.counters.refresh.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();

        let email = if state.fail_refresh {
            None
        } else {
            state.refresh_tokens.remove(refresh_token.expose_secret())
        };
        let Some(email) = email else {
            return Err(GatewayError::api(
                400,
                Some("refresh_token_not_found"),
                "Invalid Refresh Token: Refresh Token Not Found",
            ));
        };
        let Some(id) = state.users.get(&email).map(|u| u.id) else {
            return Err(GatewayError::api(404, Some("user_not_found"), "User not found"));
        };
        Ok(state.issue_session(&email, id))
    }

    async fn sign_out(&self, access_token: &SecretString) -> Result<(), GatewayError> {
        self.counters.sign_out.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(email) = state.access_tokens.remove(access_token.expose_secret()) {
            state.refresh_tokens.retain(|_, owner| *owner != email);
        }
        Ok(())
    }

    async fn query_rows(
        &self,
        query: &RowQuery,
        _token: Option<&SecretString>,
    ) -> Result<Vec<Value>, GatewayError> {
        self.counters.query_rows.fetch_add(1, Ordering::SeqCst);
        self.select(query).await
    }

    async fn get_row_by_id(
        &self,
        table: &str,
        id: &str,
        _token: Option<&SecretString>,
    ) -> Result<Option<Value>, GatewayError> {
        self.counters.get_row_by_id.fetch_add(1, Ordering::SeqCst);
        let query = RowQuery::new(table).filter(Filter::eq("id", id)).limit(1);
        Ok(self.select(&query).await?.into_iter().next())
    }

    async fn insert_row(
        &self,
        table: &str,
        row: &Value,
        _token: Option<&SecretString>,
    ) -> Result<(), GatewayError> {
        self.counters.insert_row.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();

        if state.failing_tables.contains(table) {
            return Err(GatewayError::api(
                403,
                Some("42501"),
                format!("new row violates row-level security policy for table \"{table}\""),
            ));
        }

        let mut row = row.clone();
        if let Value::Object(map) = &mut row {
            map.entry("id")
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            map.entry("created_at")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        }
        state.tables.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    async fn health(&self) -> Result<(), GatewayError> {
        if self.state().unhealthy {
            return Err(GatewayError::api(503, None, "Service Unavailable"));
        }
        Ok(())
    }
}
