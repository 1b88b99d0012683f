//! `/api/cart`: the authenticated actor's server cart.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use super::{ok, ApiJson, ApiResult, AppState, Authenticated};
use crate::cart::LineUpdate;
use crate::domain::value_objects::ItemId;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddLine {
    item_id: ItemId,
    #[serde(default = "one")]
    qty: i64,
}

fn one() -> i64 { 1 }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateLine {
    item_id: ItemId,
    qty: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteParams {
    item_id: Option<ItemId>,
}

pub(crate) async fn get_cart(State(s): State<AppState>, Authenticated(actor): Authenticated) -> ApiResult<impl IntoResponse> {
    Ok(ok(s.carts.snapshot(actor).await?))
}

pub(crate) async fn add_line(
    State(s): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiJson(body): ApiJson<AddLine>,
) -> ApiResult<impl IntoResponse> {
    let snapshot = s.carts.add_line(actor, body.item_id, body.qty).await?;
    Ok((StatusCode::CREATED, ok(snapshot)))
}

pub(crate) async fn update_line(
    State(s): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiJson(body): ApiJson<UpdateLine>,
) -> ApiResult<impl IntoResponse> {
    let body = match s.carts.update_line(actor, body.item_id, body.qty).await? {
        LineUpdate::Removed => json!({ "removed": true }),
        LineUpdate::Updated(qty) => json!({ "line": { "itemId": body.item_id, "qty": qty } }),
    };
    Ok(ok(body))
}

/// With `itemId` removes that line (already absent is fine), otherwise clears the cart.
pub(crate) async fn delete_lines(
    State(s): State<AppState>,
    Authenticated(actor): Authenticated,
    Query(params): Query<DeleteParams>,
) -> ApiResult<impl IntoResponse> {
    match params.item_id {
        Some(item_id) => {
            s.carts.remove_line(actor, item_id).await?;
            Ok(ok(json!({ "removed": true })))
        }
        None => {
            s.carts.clear(actor).await?;
            Ok(ok(json!({ "cleared": true })))
        }
    }
}
