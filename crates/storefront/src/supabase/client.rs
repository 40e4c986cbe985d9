//! HTTP implementation of [`Gateway`].
//!
//! Every request carries the project key as `apikey`. The bearer token is the
//! user's access token when one is supplied, otherwise the project key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use super::types::{RawTokenResponse, RawUser};
use super::{AuthSession, Filter, Gateway, GatewayError, RowQuery, SignUp};
use crate::config::SupabaseConfig;

/// Client for the hosted backend's auth and table endpoints.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    client: reqwest::Client,
    base: Url,
    key: SecretString,
}

impl SupabaseClient {
    /// Create a client with the storefront's anon key.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &SupabaseConfig) -> Result<Self, GatewayError> {
        Self::with_key(
            config.url.clone(),
            config.anon_key.clone(),
            config.request_timeout,
        )
    }

    /// Create a client with an explicit project key (e.g., the service key
    /// used by operator tooling).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_key(
        mut base: Url,
        key: SecretString,
        timeout: Option<Duration>,
    ) -> Result<Self, GatewayError> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                client: builder.build()?,
                base,
                key,
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.inner.base.join(path)?)
    }

    /// Attach the key headers.
    fn authorize(&self, request: RequestBuilder, token: Option<&SecretString>) -> RequestBuilder {
        let bearer = token.unwrap_or(&self.inner.key);
        request
            .header("apikey", self.inner.key.expose_secret())
            .bearer_auth(bearer.expose_secret())
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if status.is_server_error() {
                tracing::error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Backend returned server error"
                );
            } else {
                tracing::debug!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Backend rejected request"
                );
            }
            return Err(GatewayError::from_response(status, &body));
        }

        Ok(body)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<AuthSession, GatewayError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let request = self.authorize(self.inner.client.post(url), None).json(&body);
        let body = self.send(request).await?;
        let raw: RawTokenResponse = serde_json::from_str(&body)?;
        Ok(raw.into_session(Utc::now()))
    }
}

/// Interpret a sign-up response.
///
/// The service answers with a session when the account is usable right away,
/// or with the bare user when the address must be confirmed first. An already
/// registered address yields a user with no identities instead of an error.
pub(crate) fn parse_sign_up(value: Value) -> Result<SignUp, GatewayError> {
    if value.get("access_token").is_some() {
        let raw: RawTokenResponse = serde_json::from_value(value)?;
        return Ok(SignUp::Session(raw.into_session(Utc::now())));
    }

    let user = match value {
        Value::Object(mut map) if map.contains_key("user") => {
            map.remove("user").unwrap_or(Value::Null)
        }
        other => other,
    };
    let raw: RawUser = serde_json::from_value(user)?;

    if raw.identities.as_ref().is_some_and(Vec::is_empty) {
        return Err(GatewayError::api(
            422,
            Some("user_already_exists"),
            "User already registered",
        ));
    }

    Ok(SignUp::ConfirmationRequired(raw.into()))
}

#[async_trait]
impl Gateway for SupabaseClient {
    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, GatewayError> {
        let url = self.endpoint("auth/v1/signup")?;
        let request = self
            .authorize(self.inner.client.post(url), None)
            .json(&json!({ "email": email, "password": password }));

        let body = self.send(request).await?;
        parse_sign_up(serde_json::from_str(&body)?)
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, GatewayError> {
        self.token_grant(
            "password",
            json!({ "email": email, "password": password }),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &SecretString) -> Result<AuthSession, GatewayError> {
        self.token_grant(
            "refresh_token",
            json!({ "refresh_token": refresh_token.expose_secret() }),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, access_token: &SecretString) -> Result<(), GatewayError> {
        let url = self.endpoint("auth/v1/logout")?;
        let request = self.authorize(self.inner.client.post(url), Some(access_token));
        self.send(request).await.map(|_| ())
    }

    #[instrument(skip(self, token), fields(table = query.table()))]
    async fn query_rows(
        &self,
        query: &RowQuery,
        token: Option<&SecretString>,
    ) -> Result<Vec<Value>, GatewayError> {
        let mut url = self.endpoint(&format!("rest/v1/{}", query.table()))?;
        url.query_pairs_mut().extend_pairs(query.query_pairs());

        let request = self.authorize(self.inner.client.get(url), token);
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    #[instrument(skip(self, token))]
    async fn get_row_by_id(
        &self,
        table: &str,
        id: &str,
        token: Option<&SecretString>,
    ) -> Result<Option<Value>, GatewayError> {
        let query = RowQuery::new(table).filter(Filter::eq("id", id)).limit(1);
        let rows = self.query_rows(&query, token).await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, row, token))]
    async fn insert_row(
        &self,
        table: &str,
        row: &Value,
        token: Option<&SecretString>,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("rest/v1/{table}"))?;
        let request = self
            .authorize(self.inner.client.post(url), token)
            .header("Prefer", "return=minimal")
            .json(row);
        self.send(request).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn health(&self) -> Result<(), GatewayError> {
        let url = self.endpoint("auth/v1/health")?;
        let request = self.authorize(self.inner.client.get(url), None);
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> SupabaseClient {
        SupabaseClient::with_key(
            Url::parse(base).unwrap(),
            SecretString::from("anon-key"),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = client("http://localhost:54321/project");
        assert_eq!(
            client.endpoint("rest/v1/motorcycles").unwrap().as_str(),
            "http://localhost:54321/project/rest/v1/motorcycles"
        );
    }

    #[test]
    fn test_query_is_percent_encoded() {
        let client = client("https://abc.supabase.co/");
        let query = RowQuery::new("motorcycles").filter(Filter::or(vec![
            Filter::ilike("model", "v4 s"),
            Filter::ilike("brand", "v4 s"),
        ]));
        let mut url = client.endpoint("rest/v1/motorcycles").unwrap();
        url.query_pairs_mut().extend_pairs(query.query_pairs());

        assert_eq!(
            url.query(),
            Some("select=*&or=%28model.ilike.*v4+s*%2Cbrand.ilike.*v4+s*%29")
        );
    }

    #[test]
    fn test_parse_sign_up_with_session() {
        let result = parse_sign_up(json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "user": {"id": "00000000-0000-0000-0000-000000000001", "identities": [{}]}
        }))
        .unwrap();
        assert!(matches!(result, SignUp::Session(_)));
    }

    #[test]
    fn test_parse_sign_up_confirmation_required() {
        let top_level = parse_sign_up(json!({
            "id": "00000000-0000-0000-0000-000000000002",
            "email": "new@example.kz",
            "identities": [{"provider": "email"}]
        }))
        .unwrap();
        assert!(matches!(top_level, SignUp::ConfirmationRequired(_)));

        let nested = parse_sign_up(json!({
            "user": {"id": "00000000-0000-0000-0000-000000000002"},
            "session": null
        }))
        .unwrap();
        assert_eq!(
            nested.user().id.to_string(),
            "00000000-0000-0000-0000-000000000002"
        );
    }

    #[test]
    fn test_parse_sign_up_obfuscated_duplicate() {
        let err = parse_sign_up(json!({
            "id": "00000000-0000-0000-0000-000000000003",
            "email": "taken@example.kz",
            "identities": []
        }))
        .unwrap_err();
        assert!(err.is_already_registered());
    }
}
