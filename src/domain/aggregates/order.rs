//! Order Aggregate
//!
//! An order freezes its lines and pricing at creation. Afterwards only the
//! order status, payment status, payment method and payment reference move.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::domain::pricing::Totals;
use crate::domain::value_objects::{ActorId, ItemId, Money, OrderId, Quantity};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    #[validate(length(min = 2, message = "must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[validate(length(min = 2, message = "must be at least 2 characters"))]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[validate(length(min = 2, message = "must be at least 2 characters"))]
    pub city: String,
    #[validate(length(min = 2, message = "must be at least 2 characters"))]
    pub state: String,
    #[validate(length(min = 3, message = "must be at least 3 characters"))]
    pub postal_code: String,
    #[serde(default = "default_country")]
    #[validate(length(min = 2, message = "must be at least 2 characters"))]
    pub country: String,
}

fn default_country() -> String { "India".to_string() }

/// Frozen copy of a catalog item at purchase time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub item_id: ItemId,
    pub title: String,
    pub price: i64,
    pub currency: String,
    pub qty: Quantity,
    pub image_url: Option<String>,
}

impl OrderLine {
    pub fn line_total(&self) -> Money { Money::new(self.price, &self.currency).multiply(self.qty) }
}

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str { match self { $(Self::$variant => $s),+ } }
        }
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }
        impl FromStr for $name {
            type Err = OrderError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s { $($s => Ok(Self::$variant),)+ other => Err(OrderError::UnknownState(other.to_string())) }
            }
        }
    };
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Cancelled, Failed }
string_enum!(OrderStatus { Pending => "pending", Confirmed => "confirmed", Cancelled => "cancelled", Failed => "failed" });

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed }
string_enum!(PaymentStatus { Pending => "pending", Paid => "paid", Failed => "failed" });

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { #[default] Cod, Card, Razorpay }
string_enum!(PaymentMethod { Cod => "cod", Card => "card", Razorpay => "razorpay" });

/// Status vocabulary of an intent-based card provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    RequiresPaymentMethod,
    Canceled,
    Unknown,
}

impl IntentStatus {
    /// Unrecognised statuses read as `Unknown`, which is treated as a failure.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "succeeded" => Self::Succeeded,
            "processing" => Self::Processing,
            "requires_action" => Self::RequiresAction,
            "requires_payment_method" => Self::RequiresPaymentMethod,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }
}

/// What the buyer should be told after a payment result was recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome { Paid, Processing, ActionRequired, Failed }

impl PaymentOutcome {
    /// Paid and processing both count as a placed order from the buyer's side.
    pub fn proceeds(&self) -> bool { matches!(self, Self::Paid | Self::Processing) }
}

/// The only mutable part of a stored order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentUpdate {
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_ref: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub(crate) id: OrderId,
    pub(crate) actor: Option<ActorId>,
    pub(crate) shipping: ShippingInfo,
    pub(crate) lines: Vec<OrderLine>,
    pub(crate) totals: Totals,
    pub(crate) currency: String,
    pub(crate) status: OrderStatus,
    pub(crate) payment_method: PaymentMethod,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) payment_ref: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Order {
    /// New order in `pending`/`pending`.
    pub fn place(actor: Option<ActorId>, shipping: ShippingInfo, lines: Vec<OrderLine>, totals: Totals, currency: &str, method: PaymentMethod) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(), actor, shipping, lines, totals, currency: currency.to_string(),
            status: OrderStatus::Pending, payment_method: method, payment_status: PaymentStatus::Pending,
            payment_ref: None, created_at: now, updated_at: now,
        }
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn actor(&self) -> Option<ActorId> { self.actor }
    pub fn shipping(&self) -> &ShippingInfo { &self.shipping }
    pub fn lines(&self) -> &[OrderLine] { &self.lines }
    pub fn totals(&self) -> Totals { self.totals }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn payment_ref(&self) -> Option<&str> { self.payment_ref.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Whether an actor may see or act on this order. Guest orders are reachable by id.
    pub fn visible_to(&self, actor: Option<ActorId>) -> bool {
        match self.actor { None => true, Some(owner) => actor == Some(owner) }
    }

    /// Binds a provider handle (intent id or provider order id) to a still-payable order.
    pub fn begin_payment(&mut self, method: PaymentMethod, provider_ref: impl Into<String>) -> Result<(), OrderError> {
        self.ensure_payable()?;
        self.payment_method = method;
        self.payment_status = PaymentStatus::Pending;
        self.payment_ref = Some(provider_ref.into());
        self.touch();
        Ok(())
    }

    /// Applies a card provider's intent status. The intent must be the one bound to this order.
    pub fn apply_intent_status(&mut self, intent_id: &str, status: &IntentStatus) -> Result<PaymentOutcome, OrderError> {
        if self.payment_ref.as_deref() != Some(intent_id) {
            return Err(OrderError::PaymentRefMismatch);
        }
        if self.payment_status == PaymentStatus::Paid {
            return Ok(PaymentOutcome::Paid);
        }
        if self.status != OrderStatus::Pending {
            return Err(OrderError::NotPending(self.status));
        }
        let outcome = match status {
            IntentStatus::Succeeded => {
                self.status = OrderStatus::Confirmed;
                self.payment_status = PaymentStatus::Paid;
                PaymentOutcome::Paid
            }
            IntentStatus::Processing => PaymentOutcome::Processing,
            IntentStatus::RequiresAction => PaymentOutcome::ActionRequired,
            _ => {
                self.payment_status = PaymentStatus::Failed;
                PaymentOutcome::Failed
            }
        };
        self.payment_method = PaymentMethod::Card;
        self.touch();
        Ok(outcome)
    }

    /// Marks a verified payment. Re-confirming with the same reference is a no-op.
    pub fn confirm_paid(&mut self, method: PaymentMethod, payment_ref: impl Into<String>) -> Result<bool, OrderError> {
        let payment_ref = payment_ref.into();
        if self.payment_status == PaymentStatus::Paid {
            return if self.payment_ref.as_deref() == Some(payment_ref.as_str()) { Ok(false) } else { Err(OrderError::AlreadyPaid) };
        }
        if self.status != OrderStatus::Pending {
            return Err(OrderError::NotPending(self.status));
        }
        self.status = OrderStatus::Confirmed;
        self.payment_status = PaymentStatus::Paid;
        self.payment_method = method;
        self.payment_ref = Some(payment_ref);
        self.touch();
        Ok(true)
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        self.ensure_payable()?;
        self.status = OrderStatus::Cancelled;
        self.touch();
        Ok(())
    }

    pub fn payment_update(&self) -> PaymentUpdate {
        PaymentUpdate {
            status: self.status,
            payment_status: self.payment_status,
            payment_method: self.payment_method,
            payment_ref: self.payment_ref.clone(),
        }
    }

    fn ensure_payable(&self) -> Result<(), OrderError> {
        if self.payment_status == PaymentStatus::Paid { return Err(OrderError::AlreadyPaid); }
        if self.status != OrderStatus::Pending { return Err(OrderError::NotPending(self.status)); }
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError { NotPending(OrderStatus), AlreadyPaid, PaymentRefMismatch, UnknownState(String) }
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPending(s) => write!(f, "Order is {s}"),
            Self::AlreadyPaid => write!(f, "Order is already paid"),
            Self::PaymentRefMismatch => write!(f, "Payment reference does not match order"),
            Self::UnknownState(s) => write!(f, "Unknown state: {s}"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::pricing::ShippingPolicy;

    pub(crate) fn shipping() -> ShippingInfo {
        ShippingInfo {
            name: "Asha Rao".into(), email: "asha@example.com".into(), phone: None,
            address_line1: "12 MG Road".into(), address_line2: None, city: "Pune".into(),
            state: "MH".into(), postal_code: "411001".into(), country: "India".into(),
        }
    }

    fn order() -> Order {
        let line = OrderLine { item_id: ItemId::new(), title: "Lamp".into(), price: 1999, currency: "INR".into(), qty: Quantity::clamped(1), image_url: None };
        Order::place(None, shipping(), vec![line], ShippingPolicy::default().totals(1999), "INR", PaymentMethod::Card)
    }

    #[test]
    fn test_shipping_validation() {
        assert!(shipping().validate().is_ok());
        let mut bad = shipping();
        bad.postal_code = "41".into();
        assert!(bad.validate().is_err());
        bad = shipping();
        bad.email = "nope".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_intent_flow() {
        let mut o = order();
        assert_eq!((o.status(), o.payment_status()), (OrderStatus::Pending, PaymentStatus::Pending));
        o.begin_payment(PaymentMethod::Card, "pi_1").unwrap();
        assert_eq!(o.apply_intent_status("pi_2", &IntentStatus::Succeeded), Err(OrderError::PaymentRefMismatch));
        assert_eq!(o.apply_intent_status("pi_1", &IntentStatus::RequiresAction).unwrap(), PaymentOutcome::ActionRequired);
        assert_eq!(o.status(), OrderStatus::Pending);
        assert_eq!(o.apply_intent_status("pi_1", &IntentStatus::Succeeded).unwrap(), PaymentOutcome::Paid);
        assert_eq!((o.status(), o.payment_status()), (OrderStatus::Confirmed, PaymentStatus::Paid));
    }

    #[test]
    fn test_failed_intent_can_retry() {
        let mut o = order();
        o.begin_payment(PaymentMethod::Card, "pi_1").unwrap();
        let outcome = o.apply_intent_status("pi_1", &IntentStatus::RequiresPaymentMethod).unwrap();
        assert!(!outcome.proceeds());
        assert_eq!(o.payment_status(), PaymentStatus::Failed);
        o.begin_payment(PaymentMethod::Card, "pi_2").unwrap();
        assert_eq!(o.payment_status(), PaymentStatus::Pending);
    }

    #[test]
    fn test_confirm_paid_idempotent() {
        let mut o = order();
        assert_eq!(o.confirm_paid(PaymentMethod::Razorpay, "pay_1"), Ok(true));
        assert_eq!(o.confirm_paid(PaymentMethod::Razorpay, "pay_1"), Ok(false));
        assert_eq!(o.confirm_paid(PaymentMethod::Razorpay, "pay_2"), Err(OrderError::AlreadyPaid));
        assert_eq!(o.cancel(), Err(OrderError::AlreadyPaid));
    }

    #[test]
    fn test_cancelled_order_not_payable() {
        let mut o = order();
        o.cancel().unwrap();
        assert_eq!(o.begin_payment(PaymentMethod::Card, "pi"), Err(OrderError::NotPending(OrderStatus::Cancelled)));
    }

    #[test]
    fn test_intent_status_parse() {
        assert_eq!(IntentStatus::parse("succeeded"), IntentStatus::Succeeded);
        assert_eq!(IntentStatus::parse("requires_action"), IntentStatus::RequiresAction);
        assert_eq!(IntentStatus::parse("weird"), IntentStatus::Unknown);
        assert!(PaymentOutcome::Processing.proceeds());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!("confirmed".parse::<OrderStatus>().unwrap(), OrderStatus::Confirmed);
        assert_eq!(PaymentMethod::Razorpay.as_str(), "razorpay");
        assert!("bogus".parse::<PaymentStatus>().is_err());
    }
}
