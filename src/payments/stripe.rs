//! Stripe payment intents over the REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use super::{provider_message, IntentProvider, PaymentIntent};
use crate::domain::aggregates::IntentStatus;
use crate::domain::value_objects::OrderId;
use crate::{Result, StorefrontError};

const API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    status: String,
}

#[derive(Clone)]
pub struct StripeIntents {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl StripeIntents {
    pub fn new(client: Client, secret_key: impl Into<String>) -> Self {
        Self { client, secret_key: secret_key.into(), base_url: API_BASE.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn read(&self, resp: reqwest::Response) -> Result<IntentResponse> {
        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;
        if !status.is_success() {
            let msg = provider_message(&body).unwrap_or_else(|| status.to_string());
            tracing::warn!(%status, "Stripe request failed");
            return Err(StorefrontError::Provider(msg));
        }
        serde_json::from_value(body).map_err(|e| StorefrontError::Provider(format!("unexpected Stripe response: {e}")))
    }
}

/// One key per intent attempt: a retry after a failed intent must not replay the first one.
fn idempotency_key(order_id: OrderId) -> String { format!("order-{order_id}-{}", Uuid::now_v7()) }

#[async_trait]
impl IntentProvider for StripeIntents {
    async fn create_intent(&self, order_id: OrderId, amount: i64, currency: &str) -> Result<PaymentIntent> {
        let form = [
            ("amount", amount.to_string()),
            ("currency", currency.to_lowercase()),
            ("metadata[order_id]", order_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        let resp = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", idempotency_key(order_id))
            .form(&form)
            .send()
            .await?;
        let intent = self.read(resp).await?;
        let client_secret = intent
            .client_secret
            .ok_or_else(|| StorefrontError::Provider("Stripe intent has no client secret".to_string()))?;
        tracing::info!(%order_id, intent_id = %intent.id, "Stripe intent created");
        Ok(PaymentIntent { id: intent.id, client_secret })
    }

    async fn retrieve_status(&self, intent_id: &str) -> Result<IntentStatus> {
        let resp = self
            .client
            .get(format!("{}/payment_intents/{intent_id}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Ok(IntentStatus::parse(&self.read(resp).await?.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_response_shape() {
        let body = serde_json::json!({ "id": "pi_1", "client_secret": "pi_1_secret_x", "status": "requires_payment_method", "amount": 7997 });
        let parsed: IntentResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.id, "pi_1");
        assert_eq!(IntentStatus::parse(&parsed.status), IntentStatus::RequiresPaymentMethod);
    }

    #[tokio::test]
    async fn test_each_attempt_gets_its_own_idempotency_key() {
        use axum::http::HeaderMap;
        use axum::routing::post;
        use axum::{Json, Router};
        use std::sync::{Arc, Mutex};

        let keys: Arc<Mutex<Vec<String>>> = Arc::default();
        let seen = keys.clone();
        let app = Router::new().route(
            "/v1/payment_intents",
            post(move |headers: HeaderMap| {
                let seen = seen.clone();
                async move {
                    let key = headers.get("idempotency-key").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
                    let mut seen = seen.lock().unwrap();
                    seen.push(key);
                    let id = format!("pi_{}", seen.len());
                    Json(serde_json::json!({ "id": id, "client_secret": format!("{id}_secret"), "status": "requires_payment_method" }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let stripe = StripeIntents::new(Client::new(), "sk_test").with_base_url(format!("http://{addr}/v1"));
        let order_id = OrderId::new();
        let first = stripe.create_intent(order_id, 1999, "INR").await.unwrap();
        let second = stripe.create_intent(order_id, 1999, "INR").await.unwrap();

        assert_ne!(first.id, second.id);
        let keys = keys.lock().unwrap();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
        assert!(keys.iter().all(|k| k.starts_with(&format!("order-{order_id}-"))));
    }

    #[test]
    fn test_base_url_trimmed() {
        let s = StripeIntents::new(Client::new(), "sk_test").with_base_url("http://localhost:12111/v1/");
        assert_eq!(s.base_url, "http://localhost:12111/v1");
    }
}
