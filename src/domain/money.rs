use crate::domain::error::DomainError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;

/// Amount of money in cents.
///
/// Serialized as a plain JSON number (`18.5`) and accepted either as a number
/// or a decimal string (`"18.50"`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);
    /// Largest amount accepted from clients: one million yuan.
    pub const MAX_INPUT: Money = Money(100_000_000);

    pub fn from_cents(cents: u64) -> Self {
        Money(cents)
    }

    pub const fn from_yuan(yuan: u32) -> Self {
        Money(yuan as u64 * 100)
    }

    pub fn cents(&self) -> u64 {
        self.0
    }

    pub fn times(&self, quantity: u32) -> Result<Money, DomainError> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::Validation(format!("Amount {} x {} is too large", self, quantity)))
    }

    pub fn checked_add(self, rhs: Money) -> Result<Money, DomainError> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .ok_or_else(|| DomainError::Validation("Total amount is too large".to_string()))
    }

    /// Adds up amounts, failing instead of wrapping.
    pub fn try_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Result<Money, DomainError> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, Money::checked_add)
    }

    fn within_input_cap(self) -> Option<Money> {
        (self <= Money::MAX_INPUT).then_some(self)
    }

    pub fn parse(value: &str) -> Option<Money> {
        let value = value.trim();
        if value.is_empty() || value.starts_with('-') {
            return None;
        }
        let (whole, frac) = match value.split_once('.') {
            Some((w, f)) => (w, f),
            None => (value, ""),
        };
        if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let frac_cents: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().ok()? * 10,
            _ => frac.parse().ok()?,
        };
        whole.checked_mul(100)?.checked_add(frac_cents).map(Money)
    }

    fn from_f64(value: f64) -> Option<Money> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let cents = (value * 100.0).round();
        if cents > Money::MAX_INPUT.0 as f64 {
            return None;
        }
        Some(Money(cents as u64))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Report totals saturate; order totals go through [`Money::try_sum`].
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.fold(0u64, |acc, m| acc.saturating_add(m.0)))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative amount as a number or decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        v.checked_mul(100)
            .map(Money)
            .and_then(Money::within_input_cap)
            .ok_or_else(|| E::custom("amount out of range"))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        if v < 0 {
            return Err(E::custom("amount must not be negative"));
        }
        self.visit_u64(v as u64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        Money::from_f64(v).ok_or_else(|| E::custom("amount must be a non-negative number in range"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v)
            .and_then(Money::within_input_cap)
            .ok_or_else(|| E::custom(format!("invalid amount: {v}")))
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_strings() {
        assert_eq!(Money::parse("18.00"), Some(Money::from_cents(1800)));
        assert_eq!(Money::parse("7.5"), Some(Money::from_cents(750)));
        assert_eq!(Money::parse("3"), Some(Money::from_cents(300)));
        assert_eq!(Money::parse(".25"), Some(Money::from_cents(25)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Money::parse("-1.00"), None);
        assert_eq!(Money::parse("1.234"), None);
        assert_eq!(Money::parse("abc"), None);
        assert_eq!(Money::parse(""), None);
    }

    #[test]
    fn test_display_pads_cents() {
        assert_eq!(Money::from_cents(1805).to_string(), "18.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_times_and_sum() {
        let total = Money::try_sum([Money::from_yuan(12).times(2).unwrap(), Money::from_cents(650)])
            .unwrap();
        assert_eq!(total, Money::from_cents(3050));
    }

    #[test]
    fn test_arithmetic_overflow_is_a_validation_error() {
        let huge = Money::from_cents(u64::MAX / 2 + 1);
        assert!(matches!(huge.times(2), Err(DomainError::Validation(_))));
        assert!(matches!(
            Money::try_sum([huge, huge]),
            Err(DomainError::Validation(_))
        ));

        let report: Money = [huge, huge].into_iter().sum();
        assert_eq!(report.cents(), u64::MAX);
    }

    #[test]
    fn test_deserialize_rejects_amounts_above_cap() {
        assert!(serde_json::from_str::<Money>("1e17").is_err());
        assert!(serde_json::from_str::<Money>("100000000000000000").is_err());
        assert!(serde_json::from_str::<Money>("\"1000000.01\"").is_err());

        let at_cap: Money = serde_json::from_str("1000000").unwrap();
        assert_eq!(at_cap, Money::MAX_INPUT);
    }

    #[test]
    fn test_deserialize_number_and_string() {
        let from_number: Money = serde_json::from_str("16.8").unwrap();
        let from_string: Money = serde_json::from_str("\"16.80\"").unwrap();
        let from_int: Money = serde_json::from_str("16").unwrap();
        assert_eq!(from_number, Money::from_cents(1680));
        assert_eq!(from_string, Money::from_cents(1680));
        assert_eq!(from_int, Money::from_cents(1600));
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        assert!(serde_json::from_str::<Money>("-2").is_err());
        assert!(serde_json::from_str::<Money>("-2.5").is_err());
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_value(Money::from_cents(1850)).unwrap();
        assert_eq!(json, serde_json::json!(18.5));
    }
}
