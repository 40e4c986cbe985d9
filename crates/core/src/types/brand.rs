//! Motorcycle brands offered in the catalog filter.
//!
//! The filter panel offers a fixed set of brands plus an "all brands"
//! sentinel. Brand matching against catalog rows is exact and
//! case-sensitive, so [`Brand::as_str`] is the value stored in the backend.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a string is not one of the known brands.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown brand: {0}")]
pub struct UnknownBrand(pub String);

/// A brand from the fixed filter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Brand {
    Ducati,
    Bmw,
    Suzuki,
    Kawasaki,
    Honda,
    Ktm,
    Aprilia,
    Racer,
}

impl Brand {
    /// Every brand, in filter-panel order.
    pub const ALL: [Self; 8] = [
        Self::Ducati,
        Self::Bmw,
        Self::Suzuki,
        Self::Kawasaki,
        Self::Honda,
        Self::Ktm,
        Self::Aprilia,
        Self::Racer,
    ];

    /// The exact value stored in the `brand` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ducati => "Ducati",
            Self::Bmw => "BMW",
            Self::Suzuki => "Suzuki",
            Self::Kawasaki => "Kawasaki",
            Self::Honda => "Honda",
            Self::Ktm => "KTM",
            Self::Aprilia => "Aprilia",
            Self::Racer => "Racer",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Brand {
    type Err = UnknownBrand;

    /// Case-sensitive: `"honda"` is not `Honda`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|brand| brand.as_str() == s)
            .ok_or_else(|| UnknownBrand(s.to_string()))
    }
}

impl TryFrom<String> for Brand {
    type Error = UnknownBrand;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Brand> for String {
    fn from(brand: Brand) -> Self {
        brand.as_str().to_string()
    }
}

/// Brand selection in the catalog filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BrandFilter {
    /// The "all brands" sentinel: no brand restriction.
    #[default]
    All,
    /// Restrict to one brand.
    Only(Brand),
}

impl BrandFilter {
    /// URL value of the sentinel.
    pub const ALL_VALUE: &'static str = "all";

    /// The value used in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => Self::ALL_VALUE,
            Self::Only(brand) => brand.as_str(),
        }
    }

    /// The brand to restrict to, if any.
    #[must_use]
    pub const fn brand(self) -> Option<Brand> {
        match self {
            Self::All => None,
            Self::Only(brand) => Some(brand),
        }
    }
}

impl FromStr for BrandFilter {
    type Err = UnknownBrand;

    /// An empty value or `all` selects the sentinel.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == Self::ALL_VALUE {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

impl fmt::Display for BrandFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
