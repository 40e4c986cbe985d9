//! Customer profile rows (`profiles` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::UserId;

/// A stored customer profile.
///
/// The `id` is the auth subject of the account it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A profile to insert right after account creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProfile {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl NewProfile {
    /// Build a profile from registration input. Blank optional fields are
    /// stored as null.
    #[must_use]
    pub fn new(id: UserId, email: &str, full_name: &str, phone: &str) -> Self {
        Self {
            id,
            email: email.trim().to_string(),
            full_name: non_blank(full_name),
            phone: non_blank(phone),
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(non_blank))
}
