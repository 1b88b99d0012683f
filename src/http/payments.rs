//! Payment endpoints. Orders are looked up for the caller's identity, so a guest
//! can pay for a guest order and a member only for their own.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use super::{ok, ApiError, ApiJson, ApiResult, AppState, MaybeAuthenticated};
use crate::checkout::Verification;
use crate::domain::value_objects::OrderId;
use crate::StorefrontError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderRef {
    order_id: OrderId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PaymentReport {
    #[serde(default = "stripe")]
    provider: String,
    intent_id: String,
    #[serde(default)]
    status: String,
}

fn stripe() -> String { "stripe".to_string() }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RazorpayCompletion {
    order_id: OrderId,
    rzp_order_id: String,
    payment_id: String,
    signature: String,
}

pub(crate) async fn stripe_intent(
    State(s): State<AppState>,
    MaybeAuthenticated(actor): MaybeAuthenticated,
    ApiJson(body): ApiJson<OrderRef>,
) -> ApiResult<impl IntoResponse> {
    let intent = s.checkout.start_card_payment(actor, body.order_id).await?;
    Ok(ok(json!({ "clientSecret": intent.client_secret, "intentId": intent.id })))
}

pub(crate) async fn record_payment(
    State(s): State<AppState>,
    MaybeAuthenticated(actor): MaybeAuthenticated,
    Path(order_id): Path<OrderId>,
    ApiJson(body): ApiJson<PaymentReport>,
) -> ApiResult<impl IntoResponse> {
    if body.provider != "stripe" {
        return Err(StorefrontError::validation("provider", format!("unsupported provider {}", body.provider)).into());
    }
    let outcome = s.checkout.record_payment_result(actor, order_id, &body.intent_id, &body.status).await?;
    Ok(ok(json!({ "outcome": outcome, "proceed": outcome.proceeds() })))
}

pub(crate) async fn razorpay_order(
    State(s): State<AppState>,
    MaybeAuthenticated(actor): MaybeAuthenticated,
    ApiJson(body): ApiJson<OrderRef>,
) -> ApiResult<impl IntoResponse> {
    let checkout = s.checkout.create_provider_order(actor, body.order_id).await?;
    Ok(ok(json!({
        "orderId": checkout.order_id,
        "rzpOrderId": checkout.provider_order.id,
        "amount": checkout.provider_order.amount,
        "currency": checkout.provider_order.currency,
        "key": checkout.key_id,
    })))
}

pub(crate) async fn razorpay_verify(
    State(s): State<AppState>,
    MaybeAuthenticated(actor): MaybeAuthenticated,
    ApiJson(body): ApiJson<RazorpayCompletion>,
) -> ApiResult<impl IntoResponse> {
    let verdict = s
        .checkout
        .verify_and_confirm(actor, body.order_id, &body.rzp_order_id, &body.payment_id, &body.signature)
        .await?;
    match verdict {
        Verification::Accepted => Ok(ok(json!({}))),
        Verification::Rejected(reason) => Err(ApiError::new(StatusCode::BAD_REQUEST, reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::TestApp;
    use crate::domain::aggregates::{IntentStatus, PaymentStatus};
    use crate::domain::value_objects::OrderId;
    use crate::payments::{signature, IntentProvider, PaymentIntent, ProviderOrder, ProviderOrderGateway};
    use crate::ports::OrderRepository;
    use crate::Result;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    const SECRET: &str = "rzp_secret";

    struct DeclinedCard;

    #[async_trait]
    impl IntentProvider for DeclinedCard {
        async fn create_intent(&self, _: OrderId, _: i64, _: &str) -> Result<PaymentIntent> {
            Ok(PaymentIntent { id: "pi_1".into(), client_secret: "pi_1_secret".into() })
        }
        async fn retrieve_status(&self, _: &str) -> Result<IntentStatus> { Ok(IntentStatus::RequiresPaymentMethod) }
    }

    struct Gateway;

    #[async_trait]
    impl ProviderOrderGateway for Gateway {
        fn key_id(&self) -> &str { "rzp_key" }
        async fn create_provider_order(&self, _: OrderId, amount: i64, currency: &str) -> Result<ProviderOrder> {
            Ok(ProviderOrder { id: "order_RZP1".into(), amount, currency: currency.into() })
        }
        fn verify_signature(&self, provider_order_id: &str, payment_id: &str, sig: &str) -> bool {
            signature::verify(SECRET, provider_order_id, payment_id, sig)
        }
    }

    async fn app_with_order(method: &str) -> (TestApp, String) {
        let app = TestApp::with_checkout(|c| c.with_intents(Arc::new(DeclinedCard)).with_gateway(Arc::new(Gateway))).await;
        let body = json!({
            "shipping": {
                "name": "Asha Rao", "email": "asha@example.com", "addressLine1": "12 MG Road",
                "city": "Pune", "state": "MH", "postalCode": "411001", "country": "India"
            },
            "lines": [{ "itemId": app.rug, "qty": 2 }],
            "paymentMethod": method,
        });
        let (status, placed) = app.call("POST", "/api/orders", None, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = placed["id"].as_str().unwrap().to_string();
        (app, id)
    }

    #[tokio::test]
    async fn test_razorpay_flow() {
        let (app, id) = app_with_order("razorpay").await;
        let (status, body) = app.call("POST", "/api/payments/razorpay/order", None, Some(json!({ "orderId": id }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rzpOrderId"], "order_RZP1");
        assert_eq!(body["amount"], 5998);
        assert_eq!(body["key"], "rzp_key");

        let verify = |sig: String| json!({ "orderId": id, "rzpOrderId": "order_RZP1", "paymentId": "pay_1", "signature": sig });
        let (status, body) = app.call("POST", "/api/payments/razorpay/verify", None, Some(verify("00".repeat(32)))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid payment signature");

        let good = signature::sign(SECRET, "order_RZP1", "pay_1").unwrap();
        let (status, body) = app.call("POST", "/api/payments/razorpay/verify", None, Some(verify(good))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));

        let order = app.store.get_order(id.parse().unwrap(), None).await.unwrap().unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_declined_card_reported() {
        let (app, id) = app_with_order("card").await;
        let (status, body) = app.call("POST", "/api/payments/stripe/intent", None, Some(json!({ "orderId": id }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["clientSecret"], "pi_1_secret");

        let uri = format!("/api/orders/{id}/pay");
        let report = json!({ "provider": "stripe", "intentId": "pi_1", "status": "succeeded" });
        let (status, body) = app.call("POST", &uri, None, Some(report)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "failed");
        assert_eq!(body["proceed"], false);

        let (status, _) = app.call("POST", &uri, None, Some(json!({ "provider": "paypal", "intentId": "x" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let app = TestApp::new().await;
        let (status, body) =
            app.call("POST", "/api/payments/stripe/intent", None, Some(json!({ "orderId": OrderId::new() }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Stripe not configured");
    }
}
