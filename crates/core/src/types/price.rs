//! Catalog prices.
//!
//! Prices are stored by the backend as a plain numeric amount in currency
//! units. The dealership sells in tenge, so display defaults to KZT with
//! thousands grouped by spaces and no fractional part: `12 500 000 ₸`.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (tenge, not tiyn).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price in the store currency.
    #[must_use]
    pub const fn kzt(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::KZT)
    }

    /// Format for display, rounded to whole units.
    ///
    /// ```
    /// use azmotos_core::Price;
    /// use rust_decimal::Decimal;
    ///
    /// assert_eq!(Price::kzt(Decimal::new(12_500_000, 0)).display(), "12 500 000 ₸");
    /// assert_eq!(Price::kzt(Decimal::new(99_950, 2)).display(), "1 000 ₸");
    /// ```
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .amount
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let digits = rounded.abs().trunc().to_string();
        let grouped = group_thousands(&digits);
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        format!("{sign}{grouped} {}", self.currency_code.symbol())
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// Insert a space between every group of three digits, from the right.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    KZT,
    USD,
    EUR,
}

impl CurrencyCode {
    /// Display symbol, placed after the amount.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::KZT => "₸",
            Self::USD => "$",
            Self::EUR => "€",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("0"), "0");
        assert_eq!(group_thousands("999"), "999");
        assert_eq!(group_thousands("1000"), "1 000");
        assert_eq!(group_thousands("1234567"), "1 234 567");
    }

    #[test]
    fn test_display_rounds_half_away_from_zero() {
        assert_eq!(Price::kzt(Decimal::new(15, 1)).display(), "2 ₸");
        assert_eq!(Price::kzt(Decimal::new(14, 1)).display(), "1 ₸");
    }

    #[test]
    fn test_display_zero_and_negative() {
        assert_eq!(Price::kzt(Decimal::ZERO).display(), "0 ₸");
        assert_eq!(Price::kzt(Decimal::new(-4_500, 0)).display(), "-4 500 ₸");
    }

    #[test]
    fn test_other_currency_symbol() {
        let price = Price::new(Decimal::new(18_990, 0), CurrencyCode::USD);
        assert_eq!(price.to_string(), "18 990 $");
    }
}
