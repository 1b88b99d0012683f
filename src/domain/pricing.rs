//! Order pricing in integer minor units.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Money, MoneyError};

pub const DEFAULT_CURRENCY: &str = "INR";
pub const FREE_SHIPPING_THRESHOLD: i64 = 5000;
pub const FLAT_SHIPPING_FEE: i64 = 99;

/// Flat shipping fee waived at or above a subtotal threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    pub free_threshold: i64,
    pub flat_fee: i64,
}

impl Default for ShippingPolicy {
    fn default() -> Self { Self { free_threshold: FREE_SHIPPING_THRESHOLD, flat_fee: FLAT_SHIPPING_FEE } }
}

impl ShippingPolicy {
    pub fn fee_for(&self, subtotal: i64) -> i64 {
        if subtotal == 0 || subtotal >= self.free_threshold { 0 } else { self.flat_fee.max(0) }
    }

    pub fn totals(&self, subtotal: i64) -> Totals {
        let subtotal = subtotal.max(0);
        let shipping_fee = self.fee_for(subtotal);
        Totals { subtotal, shipping_fee, total: subtotal.saturating_add(shipping_fee) }
    }

    /// Sums priced lines, rejecting any line in another currency.
    pub fn price<'a>(&self, currency: &str, line_totals: impl IntoIterator<Item = &'a Money>) -> Result<Totals, MoneyError> {
        let subtotal = line_totals.into_iter().try_fold(Money::zero(currency), |acc, m| acc.add(m))?;
        Ok(self.totals(subtotal.amount()))
    }
}

/// `total == subtotal + shipping_fee`, all non-negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub total: i64,
}
