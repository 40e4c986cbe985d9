//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SUPABASE_URL` - Base URL of the hosted backend (e.g., https://abc.supabase.co)
//! - `SUPABASE_ANON_KEY` - Public anon key (high entropy, placeholder checked)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_STATIC_DIR` - Static asset directory (default: crates/storefront/static)
//! - `SUPABASE_REQUEST_TIMEOUT_SECS` - Per-request timeout for backend calls (default: none)
//! - `CATALOG_FAILURE_MODE` - `silent` or `banner` (default: silent)
//! - `SESSION_FAILURE_MODE` - `redirect` or `error` (default: redirect)
//! - `SIGNUP_BACKOFF_BASE_MS` - First rate-limit backoff step (default: 1000)
//! - `SIGNUP_BACKOFF_CAP_MS` - Backoff ceiling (default: 60000)
//! - `PROFILE_SETTLE_DELAY_MS` - Wait between sign-up and profile insert (default: 1000)
//! - `DEALER_WHATSAPP` - WhatsApp number, digits only
//! - `DEALER_PHONES` - Comma separated phone numbers shown on the contact page
//! - `DEALER_EMAIL`, `DEALER_ADDRESS`, `DEALER_HOURS` - Contact page details
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// What the catalog does when the backend query fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogFailureMode {
    /// Log and keep whatever is already on screen.
    #[default]
    Silent,
    /// Log and show an error banner above the results.
    Banner,
}

impl FromStr for CatalogFailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "banner" => Ok(Self::Banner),
            other => Err(format!("expected 'silent' or 'banner', got '{other}'")),
        }
    }
}

/// What protected pages do when the session store cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionFailureMode {
    /// Treat the visitor as signed out.
    #[default]
    Redirect,
    /// Render a 503 error page.
    Error,
}

impl FromStr for SessionFailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redirect" => Ok(Self::Redirect),
            "error" => Ok(Self::Error),
            other => Err(format!("expected 'redirect' or 'error', got '{other}'")),
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Hosted backend connection
    pub supabase: SupabaseConfig,
    pub catalog_failure_mode: CatalogFailureMode,
    pub session_failure_mode: SessionFailureMode,
    /// Registration timing
    pub signup: SignupConfig,
    /// Dealer contact details
    pub dealer: DealerConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Hosted backend configuration.
///
/// Implements `Debug` manually to redact the key.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL; auth lives under `/auth/v1`, tables under `/rest/v1`
    pub url: Url,
    /// Anon key, sent as `apikey` on every request
    pub anon_key: SecretString,
    /// Per-request timeout; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Timing knobs for the registration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignupConfig {
    /// Delay after the first rate-limited attempt; doubles per attempt
    pub backoff_base: Duration,
    /// Upper bound on the backoff delay
    pub backoff_cap: Duration,
    /// Wait between account creation and the profile insert
    pub profile_settle_delay: Duration,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_millis(1000),
            backoff_cap: Duration::from_millis(60_000),
            profile_settle_delay: Duration::from_millis(1000),
        }
    }
}

/// Dealer contact details shown on the contact and detail pages.
#[derive(Debug, Clone, Default)]
pub struct DealerConfig {
    /// WhatsApp number in international format, digits only
    pub whatsapp: Option<String>,
    pub phones: Vec<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub hours: Option<String>,
}

impl DealerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let whatsapp = get_optional_env("DEALER_WHATSAPP")
            .map(|raw| raw.chars().filter(char::is_ascii_digit).collect::<String>());
        if whatsapp.as_deref() == Some("") {
            return Err(ConfigError::InvalidEnvVar(
                "DEALER_WHATSAPP".to_string(),
                "must contain digits".to_string(),
            ));
        }

        let phones = get_optional_env("DEALER_PHONES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            whatsapp,
            phones,
            email: get_optional_env("DEALER_EMAIL"),
            address: get_optional_env("DEALER_ADDRESS"),
            hours: get_optional_env("DEALER_HOURS"),
        })
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the anon key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let static_dir = PathBuf::from(get_env_or_default(
            "STOREFRONT_STATIC_DIR",
            "crates/storefront/static",
        ));

        let supabase = SupabaseConfig::from_env()?;
        let catalog_failure_mode = parse_env("CATALOG_FAILURE_MODE", "silent")?;
        let session_failure_mode = parse_env("SESSION_FAILURE_MODE", "redirect")?;

        let signup = SignupConfig {
            backoff_base: Duration::from_millis(parse_env("SIGNUP_BACKOFF_BASE_MS", "1000")?),
            backoff_cap: Duration::from_millis(parse_env("SIGNUP_BACKOFF_CAP_MS", "60000")?),
            profile_settle_delay: Duration::from_millis(parse_env(
                "PROFILE_SETTLE_DELAY_MS",
                "1000",
            )?),
        };
        if signup.backoff_cap < signup.backoff_base {
            return Err(ConfigError::InvalidEnvVar(
                "SIGNUP_BACKOFF_CAP_MS".to_string(),
                "must not be smaller than SIGNUP_BACKOFF_BASE_MS".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            base_url,
            static_dir,
            supabase,
            catalog_failure_mode,
            session_failure_mode,
            signup,
            dealer: DealerConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration with every optional setting at its default.
    #[must_use]
    pub fn with_defaults(base_url: impl Into<String>, supabase: SupabaseConfig) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: base_url.into(),
            static_dir: PathBuf::from("crates/storefront/static"),
            supabase,
            catalog_failure_mode: CatalogFailureMode::default(),
            session_failure_mode: SessionFailureMode::default(),
            signup: SignupConfig::default(),
            dealer: DealerConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl SupabaseConfig {
    /// Load the backend connection settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL or anon key is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = parse_url("SUPABASE_URL")?;
        let anon_key = get_validated_secret("SUPABASE_ANON_KEY")?;
        let request_timeout = get_optional_env("SUPABASE_REQUEST_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "SUPABASE_REQUEST_TIMEOUT_SECS".to_string(),
                        e.to_string(),
                    )
                })
            })
            .transpose()?;

        Ok(Self {
            url,
            anon_key,
            request_timeout,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a required URL, normalizing it to end with a slash so relative joins
/// keep the full path.
fn parse_url(key: &str) -> Result<Url, ConfigError> {
    let raw = get_required_env(key)?;
    let with_slash = if raw.ends_with('/') {
        raw
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an http(s) URL".to_string(),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real keys (JWTs, random tokens) have high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key from the project settings."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
