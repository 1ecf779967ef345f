//! Pricing value objects: discounts, pricing policy and order totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Discount attached to a product, resolved once into canonical numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Discount {
    Percentage(Decimal),
    Flat(Decimal),
}

impl Discount {
    /// Price after the discount, never below zero.
    pub fn apply(&self, price: Decimal) -> Decimal {
        let reduced = match self {
            Self::Percentage(pct) => price - price * *pct / HUNDRED,
            Self::Flat(amount) => price - *amount,
        };
        reduced.max(Decimal::ZERO).round_dp(2)
    }

    /// Effective percentage off `price`, two decimal places.
    pub fn percentage_of(&self, price: Decimal) -> Decimal {
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        match self {
            Self::Percentage(pct) => (*pct).min(HUNDRED),
            Self::Flat(amount) => ((*amount).min(price) / price * HUNDRED).round_dp(2),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Self::Percentage(pct) => *pct >= Decimal::ZERO && *pct <= HUNDRED,
            Self::Flat(amount) => *amount >= Decimal::ZERO,
        }
    }
}

/// List price with its discount resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub price: Decimal,
    pub discounted_price: Decimal,
    pub discount_percentage: Decimal,
}

impl PriceQuote {
    pub fn resolve(price: Decimal, discount: Option<&Discount>) -> Self {
        match discount {
            Some(d) => Self {
                price,
                discounted_price: d.apply(price),
                discount_percentage: d.percentage_of(price),
            },
            None => Self::undiscounted(price),
        }
    }

    pub fn undiscounted(price: Decimal) -> Self {
        Self { price, discounted_price: price, discount_percentage: Decimal::ZERO }
    }
}

/// How order discount and tax are derived. Loaded from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PricingPolicy {
    pub tax_percent: Decimal,
    pub apply_line_discounts: bool,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self { tax_percent: Decimal::ZERO, apply_line_discounts: true }
    }
}

/// Order money figures. `total == subtotal - discount + tax` by construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    #[serde(rename = "totalPrice")]
    pub total: Decimal,
}

impl Totals {
    /// Computes totals from `(quote, quantity)` pairs.
    pub fn compute<'a, I>(lines: I, policy: &PricingPolicy) -> Self
    where
        I: IntoIterator<Item = (&'a PriceQuote, u32)>,
    {
        let mut subtotal = Decimal::ZERO;
        let mut discount = Decimal::ZERO;
        for (quote, qty) in lines {
            let qty = Decimal::from(qty);
            subtotal += quote.price * qty;
            if policy.apply_line_discounts {
                discount += (quote.price - quote.discounted_price).max(Decimal::ZERO) * qty;
            }
        }
        let taxable = subtotal - discount;
        let tax = (taxable * policy.tax_percent / HUNDRED).round_dp(2);
        Self { subtotal, discount, tax, total: taxable + tax }
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal - self.discount + self.tax
    }

    /// Total in the currency's minor unit, as payment gateways expect.
    pub fn total_minor_units(&self) -> i64 {
        use rust_decimal::prelude::ToPrimitive;
        (self.total * HUNDRED).round().to_i64().unwrap_or(i64::MAX)
    }
}
