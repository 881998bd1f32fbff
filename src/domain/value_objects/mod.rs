//! Value Objects for the storefront

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }
    pub fn rounded(&self) -> Money { Money::new(round_currency(self.amount), &self.currency) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount, self.currency) }
}

/// Rounds to cents, halves away from zero.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

/// Discount percentage, strictly positive and at most 100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percent(Decimal);

impl Percent {
    pub fn new(value: Decimal) -> Result<Self, PercentError> {
        if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED { return Err(PercentError::OutOfRange(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> Decimal { self.0 }

    /// `amount * (100 - p) / 100`, unrounded.
    pub fn apply_discount(&self, amount: Decimal) -> Decimal {
        amount * (Decimal::ONE_HUNDRED - self.0) / Decimal::ONE_HUNDRED
    }
}

impl TryFrom<Decimal> for Percent {
    type Error = PercentError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Percent> for Decimal {
    fn from(value: Percent) -> Self { value.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum PercentError { OutOfRange(Decimal) }
impl std::error::Error for PercentError {}
impl fmt::Display for PercentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::OutOfRange(v) => write!(f, "percentage {v} must be greater than 0 and at most 100") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_money_add() {
        let a = Money::new(Decimal::new(100, 0), "CLP");
        let b = Money::new(Decimal::new(50, 0), "CLP");
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert!(a.add(&Money::zero("USD")).is_err());
    }
    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(round_currency(Decimal::new(10005, 3)), Decimal::new(1001, 2));
        assert_eq!(Money::new(Decimal::new(33333, 4), "CLP").rounded().amount(), Decimal::new(333, 2));
    }
    #[test]
    fn test_quantity_subtract() {
        let q = Quantity::new(5);
        assert_eq!(q.subtract(5), Some(Quantity::new(0)));
        assert_eq!(q.subtract(6), None);
        assert!(q.subtract(5).unwrap().is_zero());
    }
    #[test]
    fn test_percent_bounds() {
        assert!(Percent::new(Decimal::ZERO).is_err());
        assert!(Percent::new(Decimal::new(101, 0)).is_err());
        let p = Percent::new(Decimal::new(25, 0)).unwrap();
        assert_eq!(p.apply_discount(Decimal::new(1000, 0)), Decimal::new(750, 0));
        assert_eq!(Percent::new(Decimal::ONE_HUNDRED).unwrap().apply_discount(Decimal::new(90, 0)), Decimal::ZERO);
    }
    #[test]
    fn test_percent_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Percent>("\"150\"").is_err());
        assert_eq!(serde_json::from_str::<Percent>("\"12.5\"").unwrap().value(), Decimal::new(125, 1));
    }
}
