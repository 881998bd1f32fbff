//! Discount pricing
//!
//! A product carries at most one discount policy: a flat percentage applied
//! to every unit, or a table of volume tiers. For tiered products the tier
//! with the highest `min_quantity` not exceeding the requested quantity wins;
//! when no tier matches the base price applies.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::domain::value_objects::{round_currency, Percent};

/// Price applied once a tier threshold is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TierPrice {
    UnitPrice(Decimal),
    Percent(Percent),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeTier {
    pub min_quantity: u32,
    #[serde(flatten)]
    pub price: TierPrice,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DiscountPolicy {
    #[default]
    None,
    Flat(Percent),
    Tiered(Vec<VolumeTier>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub quantity: u32,
    pub base_unit_price: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub discounted: bool,
}

impl DiscountPolicy {
    /// Builds the policy from the two storage columns.
    pub fn from_parts(percent: Option<Decimal>, tiers: Vec<VolumeTier>) -> Result<Self, PricingError> {
        let policy = match (percent, tiers.is_empty()) {
            (Some(_), false) => return Err(PricingError::ConflictingDiscounts),
            (Some(p), true) => DiscountPolicy::Flat(Percent::new(p).map_err(|_| PricingError::InvalidPercent(p))?),
            (None, false) => DiscountPolicy::Tiered(tiers),
            (None, true) => DiscountPolicy::None,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Splits the policy back into `(discount_percent, volume_tiers)` columns.
    pub fn to_parts(&self) -> (Option<Decimal>, Vec<VolumeTier>) {
        match self {
            DiscountPolicy::None => (None, vec![]),
            DiscountPolicy::Flat(p) => (Some(p.value()), vec![]),
            DiscountPolicy::Tiered(tiers) => (None, tiers.clone()),
        }
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        let DiscountPolicy::Tiered(tiers) = self else { return Ok(()) };
        let mut seen = HashSet::new();
        for tier in tiers {
            if tier.min_quantity == 0 { return Err(PricingError::ZeroThreshold); }
            if !seen.insert(tier.min_quantity) { return Err(PricingError::DuplicateThreshold(tier.min_quantity)); }
            if let TierPrice::UnitPrice(price) = tier.price {
                if price < Decimal::ZERO { return Err(PricingError::NegativePrice(price)); }
            }
        }
        Ok(())
    }

    /// The tier in force for `quantity`, if any.
    pub fn tier_for(&self, quantity: u32) -> Option<&VolumeTier> {
        match self {
            DiscountPolicy::Tiered(tiers) => tiers
                .iter()
                .filter(|t| t.min_quantity <= quantity)
                .max_by_key(|t| t.min_quantity),
            _ => None,
        }
    }

    pub fn unit_price(&self, base: Decimal, quantity: u32) -> Decimal {
        let price = match self {
            DiscountPolicy::None => base,
            DiscountPolicy::Flat(p) => p.apply_discount(base),
            DiscountPolicy::Tiered(_) => match self.tier_for(quantity).map(|t| t.price) {
                Some(TierPrice::UnitPrice(price)) => price,
                Some(TierPrice::Percent(p)) => p.apply_discount(base),
                None => base,
            },
        };
        round_currency(price.max(Decimal::ZERO))
    }

    pub fn quote(&self, base: Decimal, quantity: u32) -> PriceQuote {
        let unit_price = self.unit_price(base, quantity);
        PriceQuote {
            quantity,
            base_unit_price: base,
            unit_price,
            line_total: round_currency(unit_price * Decimal::from(quantity)),
            discounted: unit_price != round_currency(base),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    ConflictingDiscounts,
    InvalidPercent(Decimal),
    ZeroThreshold,
    DuplicateThreshold(u32),
    NegativePrice(Decimal),
}

impl std::error::Error for PricingError {}
impl fmt::Display for PricingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictingDiscounts => write!(f, "a product cannot carry both a flat discount and volume tiers"),
            Self::InvalidPercent(p) => write!(f, "discount percentage {p} must be greater than 0 and at most 100"),
            Self::ZeroThreshold => write!(f, "volume tier thresholds must be at least 1"),
            Self::DuplicateThreshold(q) => write!(f, "duplicate volume tier threshold {q}"),
            Self::NegativePrice(p) => write!(f, "tier unit price {p} must not be negative"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(v: i64) -> Percent { Percent::new(Decimal::new(v, 0)).unwrap() }

    fn tiers() -> DiscountPolicy {
        DiscountPolicy::Tiered(vec![
            VolumeTier { min_quantity: 10, price: TierPrice::UnitPrice(Decimal::new(900, 0)) },
            VolumeTier { min_quantity: 5, price: TierPrice::Percent(pct(5)) },
            VolumeTier { min_quantity: 50, price: TierPrice::UnitPrice(Decimal::new(800, 0)) },
        ])
    }

    #[test]
    fn test_no_discount_is_base_price() {
        assert_eq!(DiscountPolicy::None.unit_price(Decimal::new(1200, 0), 3), Decimal::new(1200, 0));
    }

    #[test]
    fn test_flat_discount_applies_unconditionally() {
        let policy = DiscountPolicy::Flat(pct(10));
        assert_eq!(policy.unit_price(Decimal::new(1500, 0), 1), Decimal::new(1350, 0));
        assert_eq!(policy.unit_price(Decimal::new(1500, 0), 100), Decimal::new(1350, 0));
    }

    #[test]
    fn test_highest_threshold_not_exceeding_quantity_wins() {
        let policy = tiers();
        let base = Decimal::new(1000, 0);
        assert_eq!(policy.unit_price(base, 4), base);
        assert_eq!(policy.unit_price(base, 5), Decimal::new(950, 0));
        assert_eq!(policy.unit_price(base, 9), Decimal::new(950, 0));
        assert_eq!(policy.unit_price(base, 10), Decimal::new(900, 0));
        assert_eq!(policy.unit_price(base, 49), Decimal::new(900, 0));
        assert_eq!(policy.unit_price(base, 500), Decimal::new(800, 0));
    }

    #[test]
    fn test_quote_line_total() {
        let q = tiers().quote(Decimal::new(1000, 0), 12);
        assert_eq!(q.unit_price, Decimal::new(900, 0));
        assert_eq!(q.line_total, Decimal::new(10800, 0));
        assert!(q.discounted);
        assert!(!tiers().quote(Decimal::new(1000, 0), 1).discounted);
    }

    #[test]
    fn test_fractional_discount_rounds_to_cents() {
        let policy = DiscountPolicy::Flat(Percent::new(Decimal::new(333, 1)).unwrap());
        assert_eq!(policy.unit_price(Decimal::new(2999, 2), 1), Decimal::new(2000, 2));
    }

    #[test]
    fn test_from_parts_rejects_both_kinds() {
        let tier = VolumeTier { min_quantity: 2, price: TierPrice::Percent(pct(5)) };
        assert_eq!(DiscountPolicy::from_parts(Some(Decimal::TEN), vec![tier]), Err(PricingError::ConflictingDiscounts));
        assert_eq!(DiscountPolicy::from_parts(None, vec![]), Ok(DiscountPolicy::None));
        assert_eq!(DiscountPolicy::from_parts(Some(Decimal::ZERO), vec![]), Err(PricingError::InvalidPercent(Decimal::ZERO)));
    }

    #[test]
    fn test_validate_thresholds() {
        let dup = DiscountPolicy::Tiered(vec![
            VolumeTier { min_quantity: 3, price: TierPrice::Percent(pct(5)) },
            VolumeTier { min_quantity: 3, price: TierPrice::Percent(pct(10)) },
        ]);
        assert_eq!(dup.validate(), Err(PricingError::DuplicateThreshold(3)));
        let zero = DiscountPolicy::Tiered(vec![VolumeTier { min_quantity: 0, price: TierPrice::Percent(pct(5)) }]);
        assert_eq!(zero.validate(), Err(PricingError::ZeroThreshold));
        let negative = DiscountPolicy::Tiered(vec![VolumeTier { min_quantity: 1, price: TierPrice::UnitPrice(Decimal::NEGATIVE_ONE) }]);
        assert_eq!(negative.validate(), Err(PricingError::NegativePrice(Decimal::NEGATIVE_ONE)));
    }

    #[test]
    fn test_tier_json_shape() {
        let tier: VolumeTier = serde_json::from_str(r#"{"min_quantity": 10, "kind": "unit_price", "value": "900"}"#).unwrap();
        assert_eq!(tier.price, TierPrice::UnitPrice(Decimal::new(900, 0)));
        let tier: VolumeTier = serde_json::from_str(r#"{"min_quantity": 5, "kind": "percent", "value": 15}"#).unwrap();
        assert_eq!(tier.price, TierPrice::Percent(pct(15)));
    }
}
