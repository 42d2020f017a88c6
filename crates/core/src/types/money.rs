//! Money amounts reported by the payment processor.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currencies Stripe charges without a minor unit.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

/// An amount in a currency's standard unit (dollars, not cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    /// Lower-case ISO 4217 code, as Stripe reports it.
    pub currency: String,
}

impl Money {
    /// Convert a Stripe minor-unit amount (e.g. `1999` USD cents) to `Money`.
    #[must_use]
    pub fn from_minor_units(minor: i64, currency: &str) -> Self {
        let currency = currency.to_ascii_lowercase();
        let scale = if ZERO_DECIMAL_CURRENCIES.contains(&currency.as_str()) {
            0
        } else {
            2
        };
        Self {
            amount: Decimal::new(minor, scale),
            currency,
        }
    }

    /// Format for display, e.g. `"19.99 USD"`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} {}", self.amount, self.currency.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor_units_two_decimals() {
        let money = Money::from_minor_units(1999, "USD");
        assert_eq!(money.amount, Decimal::new(1999, 2));
        assert_eq!(money.currency, "usd");
        assert_eq!(money.display(), "19.99 USD");
    }

    #[test]
    fn test_from_minor_units_zero_decimal_currency() {
        let money = Money::from_minor_units(1500, "jpy");
        assert_eq!(money.amount, Decimal::new(1500, 0));
        assert_eq!(money.display(), "1500 JPY");
    }
}
