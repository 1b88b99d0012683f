//! HTTP surface. Every response is an outcome envelope: `{ "ok": true, ... }`
//! on success, `{ "ok": false, "error": "<reason>" }` otherwise.

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::cart::CartService;
use crate::checkout::CheckoutService;
use crate::domain::value_objects::ActorId;
use crate::ports::Catalog;
use crate::StorefrontError;

mod cart;
mod items;
mod orders;
mod payments;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn Catalog>,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub tokens: Arc<TokenVerifier>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({ "ok": true, "status": "healthy", "service": "storefront" })) }))
        .route("/api/items", get(items::list_items))
        .route("/api/items/:id", get(items::get_item))
        .route("/api/cart", get(cart::get_cart).post(cart::add_line).patch(cart::update_line).delete(cart::delete_lines))
        .route("/api/orders", get(orders::list_orders).post(orders::create_order))
        .route("/api/orders/:id/cancel", post(orders::cancel_order))
        .route("/api/orders/:id/pay", post(payments::record_payment))
        .route("/api/payments/stripe/intent", post(payments::stripe_intent))
        .route("/api/payments/razorpay/order", post(payments::razorpay_order))
        .route("/api/payments/razorpay/verify", post(payments::razorpay_verify))
        .with_state(state)
}

// =============================================================================
// Outcome envelope
// =============================================================================

#[derive(Serialize)]
pub(crate) struct Envelope<T> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

pub(crate) fn ok<T: Serialize>(body: T) -> Json<Envelope<T>> { Json(Envelope { ok: true, body }) }

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl From<StorefrontError> for ApiError {
    fn from(err: StorefrontError) -> Self {
        let status = match &err {
            StorefrontError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            StorefrontError::Unauthorized => StatusCode::UNAUTHORIZED,
            StorefrontError::Conflict(_) => StatusCode::CONFLICT,
            StorefrontError::NotFound(_) => StatusCode::NOT_FOUND,
            StorefrontError::EmptyCart | StorefrontError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
            StorefrontError::ProviderNotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StorefrontError::Provider(_) | StorefrontError::Transport(_) => StatusCode::BAD_GATEWAY,
            StorefrontError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let StorefrontError::Storage(detail) = &err {
            tracing::error!(error = %detail, "Storage failure");
            return Self::new(status, "Internal error");
        }
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self { Self::new(StatusCode::BAD_REQUEST, rejection.body_text()) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "ok": false, "error": self.message }))).into_response()
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// `Json` whose rejection uses the outcome envelope.
pub(crate) struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

// =============================================================================
// Bearer authorization
// =============================================================================

/// Verifies HS256 bearer tokens. The actor id is read from `sub`, `userId` or `id`.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

#[derive(Deserialize)]
struct Claims {
    sub: Option<Value>,
    #[serde(rename = "userId")]
    user_id: Option<Value>,
    id: Option<Value>,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is still checked when present
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        Self { key: DecodingKey::from_secret(secret.as_bytes()), validation }
    }

    pub fn verify(&self, token: &str) -> Result<ActorId, StorefrontError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|_| StorefrontError::Unauthorized)?;
        let Claims { sub, user_id, id } = data.claims;
        [sub, user_id, id]
            .into_iter()
            .flatten()
            .find_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .and_then(|s| s.parse().ok())
            .ok_or(StorefrontError::Unauthorized)
    }

    fn actor_from(&self, parts: &Parts) -> Result<ActorId, StorefrontError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(StorefrontError::Unauthorized)?;
        self.verify(token)
    }
}

/// Requires a valid bearer credential.
pub(crate) struct Authenticated(pub ActorId);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(state.tokens.actor_from(parts)?))
    }
}

/// A missing or invalid credential means guest.
pub(crate) struct MaybeAuthenticated(pub Option<ActorId>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(state.tokens.actor_from(parts).ok()))
    }
}
