use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a price: '{0}'")]
pub struct PriceParseError(pub String);

/// Parse a numeric token as read off a flyer: `$1,299.00`, ` 2.99 `, `5`.
///
/// Currency symbols, thousands separators and surrounding whitespace are
/// ignored. Anything else that is not a plain decimal yields `None`.
pub fn parse_number(text: &str) -> Option<Decimal> {
    let clean: String = text
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if clean.is_empty() || !clean.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if !clean.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    Decimal::from_str(&clean).ok()
}

/// A shelf price in dollars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    pub fn from_cents(cents: i64) -> Self {
        Price(Decimal::from(cents) / Decimal::from(100))
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Price(decimal)
    }

    pub fn parse(text: &str) -> Option<Self> {
        parse_number(text).map(Price)
    }

    /// Effective per-item price of a multi-buy (`total / qty`), rounded to
    /// four decimal places. `None` when either side is zero.
    pub fn per_unit(total: Price, qty: u32) -> Option<Self> {
        if qty == 0 || total.0.is_zero() {
            return None;
        }
        Some(Price((total.0 / Decimal::from(qty)).round_dp(4)))
    }

    pub fn round_cents(self) -> Self {
        Price(self.0.round_dp(2))
    }

    pub fn to_cents(self) -> Option<i64> {
        (self.0 * Decimal::from(100)).round().to_i64()
    }

    pub fn amount(self) -> Decimal {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Compact form used in promo text: `5.00` → `5`, `2.50` → `2.5`.
    pub fn compact(self) -> String {
        self.0.round_dp(2).normalize().to_string()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl FromStr for Price {
    type Err = PriceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Price::parse(s).ok_or_else(|| PriceParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_accepts_flyer_shapes() {
        assert_eq!(parse_number("$1,299.00"), Some(Decimal::new(129900, 2)));
        assert_eq!(parse_number(" 2.99 "), Some(Decimal::new(299, 2)));
        assert_eq!(parse_number("5"), Some(Decimal::from(5)));
    }

    #[test]
    fn parse_number_rejects_non_numbers() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("$"), None);
        assert_eq!(parse_number("1.2.3"), None);
        assert_eq!(parse_number("12abc"), None);
    }

    #[test]
    fn per_unit_rounds_to_four_places() {
        let total = Price::parse("10").unwrap();
        assert_eq!(Price::per_unit(total, 3).unwrap().amount(), Decimal::new(33333, 4));
        let total = Price::parse("5.00").unwrap();
        assert_eq!(Price::per_unit(total, 2).unwrap(), Price::from_cents(250));
        assert!(Price::per_unit(total, 0).is_none());
    }

    #[test]
    fn display_and_compact() {
        assert_eq!(Price::from_cents(299).to_string(), "$2.99");
        assert_eq!(Price::parse("5.00").unwrap().compact(), "5");
        assert_eq!(Price::parse("2.50").unwrap().compact(), "2.5");
    }

    #[test]
    fn from_str_reports_bad_input() {
        assert!("abc".parse::<Price>().is_err());
        assert_eq!("$3.49".parse::<Price>().unwrap().to_cents(), Some(349));
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&Price::from_cents(299)).unwrap();
        assert_eq!(json, "\"2.99\"");
    }
}
