//! `/api/orders`: placement, history and cancellation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ok, ApiJson, ApiResult, AppState, Authenticated, MaybeAuthenticated};
use crate::checkout::{PlaceOrder, DEFAULT_PAGE_SIZE};
use crate::domain::aggregates::{Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus};
use crate::domain::value_objects::{ItemId, OrderId, Quantity};

#[derive(Deserialize)]
pub(crate) struct HistoryParams {
    page: Option<u32>,
    limit: Option<u32>,
    expand: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderSummary {
    id: OrderId,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
    created_at: DateTime<Utc>,
    subtotal: i64,
    shipping: i64,
    total: i64,
    currency: String,
    line_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    lines: Option<Vec<LineView>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LineView {
    item_id: ItemId,
    title: String,
    qty: Quantity,
    price: i64,
    currency: String,
    image_url: Option<String>,
    line_total: i64,
}

impl From<&OrderLine> for LineView {
    fn from(line: &OrderLine) -> Self {
        Self {
            item_id: line.item_id,
            title: line.title.clone(),
            qty: line.qty,
            price: line.price,
            currency: line.currency.clone(),
            image_url: line.image_url.clone(),
            line_total: line.line_total().amount(),
        }
    }
}

impl OrderSummary {
    fn new(order: &Order, expand: bool) -> Self {
        let totals = order.totals();
        Self {
            id: order.id(),
            status: order.status(),
            payment_status: order.payment_status(),
            payment_method: order.payment_method(),
            created_at: order.created_at(),
            subtotal: totals.subtotal,
            shipping: totals.shipping_fee,
            total: totals.total,
            currency: order.currency().to_string(),
            line_count: order.lines().len(),
            lines: expand.then(|| order.lines().iter().map(LineView::from).collect()),
        }
    }
}

pub(crate) async fn create_order(
    State(s): State<AppState>,
    MaybeAuthenticated(actor): MaybeAuthenticated,
    ApiJson(req): ApiJson<PlaceOrder>,
) -> ApiResult<impl IntoResponse> {
    let placed = s.checkout.place_order(actor, req).await?;
    Ok((StatusCode::CREATED, ok(placed)))
}

pub(crate) async fn list_orders(
    State(s): State<AppState>,
    Authenticated(actor): Authenticated,
    Query(params): Query<HistoryParams>,
) -> ApiResult<impl IntoResponse> {
    let expand = params.expand.as_deref() == Some("1");
    let history = s
        .checkout
        .order_history(actor, params.page.unwrap_or(1), params.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .await?;
    let orders: Vec<_> = history.orders.iter().map(|o| OrderSummary::new(o, expand)).collect();
    Ok(ok(json!({
        "page": history.page,
        "limit": history.limit,
        "total": history.total,
        "orders": orders,
    })))
}

pub(crate) async fn cancel_order(
    State(s): State<AppState>,
    Authenticated(actor): Authenticated,
    Path(order_id): Path<OrderId>,
) -> ApiResult<impl IntoResponse> {
    let order = s.checkout.cancel_order(actor, order_id).await?;
    Ok(ok(json!({ "id": order.id(), "status": order.status() })))
}
