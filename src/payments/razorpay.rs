//! Razorpay orders and payment signature checks.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{provider_message, signature, ProviderOrder, ProviderOrderGateway};
use crate::domain::value_objects::OrderId;
use crate::{Result, StorefrontError};

const API_BASE: &str = "https://api.razorpay.com/v1";

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Clone)]
pub struct RazorpayGateway {
    client: Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

impl std::fmt::Debug for RazorpayGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayGateway").field("key_id", &self.key_id).finish_non_exhaustive()
    }
}

impl RazorpayGateway {
    pub fn new(client: Client, key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self { client, key_id: key_id.into(), key_secret: key_secret.into(), base_url: API_BASE.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ProviderOrderGateway for RazorpayGateway {
    fn key_id(&self) -> &str { &self.key_id }

    /// `amount` is already in minor units (paise) and is sent as-is.
    async fn create_provider_order(&self, order_id: OrderId, amount: i64, currency: &str) -> Result<ProviderOrder> {
        let resp = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount,
                "currency": currency.to_uppercase(),
                "receipt": order_id.to_string(),
                "notes": { "order_id": order_id.to_string() },
            }))
            .send()
            .await?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;
        if !status.is_success() {
            tracing::warn!(%order_id, %status, "Razorpay order creation failed");
            return Err(StorefrontError::Provider(provider_message(&body).unwrap_or_else(|| status.to_string())));
        }
        let created: OrderResponse =
            serde_json::from_value(body).map_err(|e| StorefrontError::Provider(format!("unexpected Razorpay response: {e}")))?;
        tracing::info!(%order_id, provider_order_id = %created.id, "Razorpay order created");
        Ok(ProviderOrder { id: created.id, amount: created.amount, currency: created.currency })
    }

    fn verify_signature(&self, provider_order_id: &str, payment_id: &str, signature: &str) -> bool {
        signature::verify(&self.key_secret, provider_order_id, payment_id, signature)
    }
}
