//! `/api/items`: public catalog browsing.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ok, ApiResult, AppState};
use crate::domain::aggregates::CatalogItem;
use crate::domain::value_objects::ItemId;
use crate::ports::{ItemQuery, ItemSort};
use crate::StorefrontError;

pub(crate) const DEFAULT_ITEM_PAGE: i64 = 12;
pub(crate) const MAX_ITEM_PAGE: i64 = 50;

#[derive(Deserialize)]
pub(crate) struct ListParams {
    q: Option<String>,
    category: Option<String>,
    min: Option<i64>,
    max: Option<i64>,
    sort: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemView {
    id: ItemId,
    title: String,
    slug: String,
    description: Option<String>,
    price: i64,
    currency: String,
    image_url: Option<String>,
    category: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CatalogItem> for ItemView {
    fn from(item: CatalogItem) -> Self {
        Self {
            id: item.id,
            price: item.price.amount(),
            currency: item.price.currency().to_string(),
            title: item.title,
            slug: item.slug,
            description: item.description,
            image_url: item.image_url,
            category: item.category,
            created_at: item.created_at,
        }
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub(crate) async fn list_items(State(s): State<AppState>, Query(params): Query<ListParams>) -> ApiResult<impl IntoResponse> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_ITEM_PAGE).clamp(1, MAX_ITEM_PAGE);
    let query = ItemQuery {
        text: non_blank(params.q),
        category: non_blank(params.category),
        min_price: params.min,
        max_price: params.max,
        sort: params.sort.as_deref().map(ItemSort::parse).unwrap_or_default(),
        offset: (page - 1).saturating_mul(limit),
        limit,
    };
    let found = s.catalog.list_items(&query).await?;
    let items: Vec<ItemView> = found.items.into_iter().map(ItemView::from).collect();
    Ok(ok(json!({ "items": items, "page": page, "limit": limit, "total": found.total })))
}

pub(crate) async fn get_item(State(s): State<AppState>, Path(id): Path<ItemId>) -> ApiResult<impl IntoResponse> {
    let item = s.catalog.get_item(id).await?.ok_or_else(|| StorefrontError::NotFound("Not found".into()))?;
    Ok(ok(json!({ "item": ItemView::from(item) })))
}

#[cfg(test)]
mod tests {
    use super::super::tests::TestApp;
    use crate::domain::aggregates::CatalogItem;
    use crate::domain::value_objects::ItemId;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_list_clamps_paging() {
        let app = TestApp::new().await;
        let (status, body) = app.call("GET", "/api/items?page=0&limit=500", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"], 1);
        assert_eq!(body["limit"], 50);
        assert_eq!(body["total"], 2);

        let (_, body) = app.call("GET", "/api/items?limit=0", None, None).await;
        assert_eq!(body["limit"], 1);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let app = TestApp::new().await;
        app.store.insert_item(CatalogItem::new("Floor Lamp", 4999, "INR").with_category("Lighting")).await;

        let (_, body) = app.call("GET", "/api/items?q=lamp&sort=price-desc", None, None).await;
        let titles: Vec<&str> = body["items"].as_array().unwrap().iter().filter_map(|i| i["title"].as_str()).collect();
        assert_eq!(titles, ["Floor Lamp", "Lamp"]);
        assert_eq!(body["total"], 2);

        let (_, body) = app.call("GET", "/api/items?category=light&max=5000", None, None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["price"], 4999);
        assert_eq!(body["items"][0]["category"], "Lighting");
    }

    #[tokio::test]
    async fn test_get_item() {
        let app = TestApp::new().await;
        let (status, body) = app.call("GET", &format!("/api/items/{}", app.rug), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item"]["title"], "Rug");
        assert_eq!(body["item"]["currency"], "INR");

        let (status, body) = app.call("GET", &format!("/api/items/{}", ItemId::new()), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({ "ok": false, "error": "Not found" }));
    }
}
