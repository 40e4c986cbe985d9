//! Subcommand implementations.

pub mod catalog;
pub mod seed;

use secrecy::SecretString;
use url::Url;

use azmotos_storefront::supabase::SupabaseClient;

/// Build a backend client from `SUPABASE_URL` and `SUPABASE_SERVICE_KEY`.
///
/// # Errors
///
/// Returns an error if either variable is missing or the URL is invalid.
pub fn service_client() -> Result<SupabaseClient, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let url: Url = std::env::var("SUPABASE_URL")
        .map_err(|_| "SUPABASE_URL not set")?
        .parse()?;

    let key = std::env::var("SUPABASE_SERVICE_KEY")
        .map(SecretString::from)
        .map_err(|_| "SUPABASE_SERVICE_KEY not set")?;

    tracing::debug!(backend = %url, "Connecting to backend");
    Ok(SupabaseClient::with_key(url, key, None)?)
}
