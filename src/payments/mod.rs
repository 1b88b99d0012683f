//! Payment provider capabilities.
//!
//! Two shapes: intent-based card providers, where the buyer confirms with the
//! provider and the result is reported back, and order-based providers, whose
//! completion carries an HMAC signature that must verify before an order is paid.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::aggregates::IntentStatus;
use crate::domain::value_objects::OrderId;
use crate::Result;

pub mod razorpay;
pub mod signature;
pub mod stripe;

pub use razorpay::RazorpayGateway;
pub use stripe::StripeIntents;

#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for PaymentIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentIntent").field("id", &self.id).finish_non_exhaustive()
    }
}

#[async_trait]
pub trait IntentProvider: Send + Sync {
    /// `amount` is in minor units.
    async fn create_intent(&self, order_id: OrderId, amount: i64, currency: &str) -> Result<PaymentIntent>;
    /// Authoritative status of an intent, as the provider sees it.
    async fn retrieve_status(&self, intent_id: &str) -> Result<IntentStatus>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait ProviderOrderGateway: Send + Sync {
    /// Public key id handed to the buyer's checkout widget.
    fn key_id(&self) -> &str;
    async fn create_provider_order(&self, order_id: OrderId, amount: i64, currency: &str) -> Result<ProviderOrder>;
    fn verify_signature(&self, provider_order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Pulls a human-readable message out of a provider error body.
pub(crate) fn provider_message(body: &serde_json::Value) -> Option<String> {
    let err = body.get("error")?;
    err.get("message")
        .or_else(|| err.get("description"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}
