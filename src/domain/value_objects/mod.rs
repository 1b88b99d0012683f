//! Value Objects for the storefront

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self { Self(Uuid::now_v7()) }
            pub fn from_uuid(id: Uuid) -> Self { Self(id) }
            pub fn as_uuid(&self) -> Uuid { self.0 }
        }

        impl Default for $name { fn default() -> Self { Self::new() } }

        impl From<Uuid> for $name { fn from(id: Uuid) -> Self { Self(id) } }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }

        impl FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> { Uuid::parse_str(s.trim()).map(Self) }
        }
    };
}

uuid_id!(
    /// Catalog item identifier.
    ItemId
);
uuid_id!(
    /// The authenticated account that owns a server cart and its orders.
    ActorId
);
uuid_id!(OrderId);

/// Line quantity, always within `1..=99`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u32", from = "i64")]
pub struct Quantity(u32);

impl Quantity {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 99;

    /// Clamps any integer into `1..=99`; zero and negatives become 1.
    pub fn clamped(value: i64) -> Self { Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u32) }

    /// Strict constructor for request input: values outside `1..=99` are rejected.
    pub fn try_new(value: i64) -> Option<Self> {
        (Self::MIN as i64..=Self::MAX as i64).contains(&value).then(|| Self(value as u32))
    }

    pub fn value(&self) -> u32 { self.0 }

    /// Adds and clamps to the maximum; never wraps.
    pub fn saturating_add(&self, other: Quantity) -> Self { Self::clamped(self.0 as i64 + other.0 as i64) }
}

impl Default for Quantity { fn default() -> Self { Self(Self::MIN) } }
impl From<Quantity> for u32 { fn from(q: Quantity) -> u32 { q.0 } }
impl From<i64> for Quantity { fn from(v: i64) -> Self { Self::clamped(v) } }

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Integer minor-unit amount in a single currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: i64, currency: String }

impl Money {
    /// Negative amounts are floored at zero.
    pub fn new(amount: i64, currency: &str) -> Self { Self { amount: amount.max(0), currency: currency.to_uppercase() } }
    pub fn zero(currency: &str) -> Self { Self::new(0, currency) }
    pub fn amount(&self) -> i64 { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch { expected: self.currency.clone(), found: other.currency.clone() });
        }
        Ok(Money::new(self.amount.saturating_add(other.amount), &self.currency))
    }
    pub fn multiply(&self, qty: Quantity) -> Money { Money::new(self.amount.saturating_mul(qty.value() as i64), &self.currency) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.currency, self.amount) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyError { CurrencyMismatch { expected: String, found: String } }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::CurrencyMismatch { expected, found } => write!(f, "Currency mismatch: expected {expected}, found {found}") }
    }
}
