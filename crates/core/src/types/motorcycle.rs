//! Catalog items.
//!
//! Rows of the backend's `motorcycles` table. The `specs` column is a loose
//! JSON blob in the backend; here it is an explicit [`Specs`] record with four
//! optional text fields. A missing blob and a missing field are kept apart
//! (`None` vs `Some(Specs { engine: None, .. })`) even though both render as
//! "unspecified".

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Brand, MotorcycleId, Price};

/// A motorcycle listed in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motorcycle {
    /// Stable identifier, the only lookup key for detail views.
    pub id: MotorcycleId,
    /// Brand exactly as stored; may be outside the filter set.
    pub brand: String,
    pub model: String,
    pub year: i32,
    /// Price in tenge.
    pub price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_specs")]
    pub specs: Option<Specs>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Motorcycle {
    /// `"{brand} {model}"`, the display title.
    #[must_use]
    pub fn title(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }

    /// The price in the store currency.
    #[must_use]
    pub const fn price(&self) -> Price {
        Price::kzt(self.price)
    }

    /// The description, treating blank text as absent.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Technical specification blob.
///
/// Serialized with the backend's key names (`topSpeed` in camel case).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(
        default,
        rename = "topSpeed",
        alias = "top_speed",
        skip_serializing_if = "Option::is_none"
    )]
    pub top_speed: Option<String>,
}

impl Specs {
    /// Build specs from an arbitrary JSON value.
    ///
    /// Anything other than an object yields `None`. Unknown keys are ignored.
    /// Numbers and booleans are kept as their text form; empty strings, nulls,
    /// arrays and nested objects count as a missing field.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| object.get(*key))
                .and_then(json_text)
        };
        Some(Self {
            engine: field(&["engine"]),
            power: field(&["power"]),
            weight: field(&["weight"]),
            top_speed: field(&["topSpeed", "top_speed"]),
        })
    }
}

fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn deserialize_specs<'de, D>(deserializer: D) -> Result<Option<Specs>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Specs::from_json))
}

/// A motorcycle to insert into the catalog (id and timestamp are assigned by
/// the backend).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMotorcycle {
    pub brand: Brand,
    pub model: String,
    pub year: i32,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<Specs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}
