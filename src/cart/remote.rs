//! The server cart as seen from one authenticated actor.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};

use crate::cart::service::{CartService, CartSnapshot, SnapshotLine};
use crate::domain::aggregates::Cart;
use crate::domain::value_objects::{ActorId, ItemId, Quantity};
use crate::{Result, StorefrontError};

/// Cart operations already bound to an actor's credential.
#[async_trait]
pub trait RemoteCart: Send + Sync {
    async fn snapshot(&self) -> Result<CartSnapshot>;
    /// Adds to the server line, summing with any existing quantity.
    async fn add_line(&self, item_id: ItemId, qty: Quantity) -> Result<()>;
    /// Replaces the quantity; `0` removes. Missing lines are not found.
    async fn update_line(&self, item_id: ItemId, qty: u32) -> Result<()>;
    async fn remove_line(&self, item_id: ItemId) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// In-process binding of [`CartService`] to a single actor.
#[derive(Clone)]
pub struct ActorCart {
    service: CartService,
    actor: ActorId,
}

impl ActorCart {
    pub fn new(service: CartService, actor: ActorId) -> Self { Self { service, actor } }
}

#[async_trait]
impl RemoteCart for ActorCart {
    async fn snapshot(&self) -> Result<CartSnapshot> {
        self.service.snapshot(self.actor).await
    }

    async fn add_line(&self, item_id: ItemId, qty: Quantity) -> Result<()> {
        self.service.add_line(self.actor, item_id, qty.value() as i64).await.map(|_| ())
    }

    async fn update_line(&self, item_id: ItemId, qty: u32) -> Result<()> {
        self.service.update_line(self.actor, item_id, qty as i64).await.map(|_| ())
    }

    async fn remove_line(&self, item_id: ItemId) -> Result<()> {
        self.service.remove_line(self.actor, item_id).await.map(|_| ())
    }

    async fn clear(&self) -> Result<()> {
        self.service.clear(self.actor).await
    }
}

/// `RemoteCart` over the `/api/cart` endpoints with a bearer token.
#[derive(Clone, Debug)]
pub struct HttpCartClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpCartClient {
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), token: token.into() }
    }

    fn url(&self) -> String { format!("{}/api/cart", self.base_url) }

    async fn send_json(&self, method: reqwest::Method, body: Value) -> Result<Value> {
        let resp = self.client.request(method, self.url()).bearer_auth(&self.token).json(&body).send().await?;
        read_outcome(resp).await
    }
}

#[async_trait]
impl RemoteCart for HttpCartClient {
    async fn snapshot(&self) -> Result<CartSnapshot> {
        let resp = self.client.get(self.url()).bearer_auth(&self.token).send().await?;
        let body = read_outcome(resp).await?;
        parse_snapshot(&body)
    }

    async fn add_line(&self, item_id: ItemId, qty: Quantity) -> Result<()> {
        self.send_json(reqwest::Method::POST, json!({ "itemId": item_id, "qty": qty.value() })).await.map(|_| ())
    }

    async fn update_line(&self, item_id: ItemId, qty: u32) -> Result<()> {
        self.send_json(reqwest::Method::PATCH, json!({ "itemId": item_id, "qty": qty })).await.map(|_| ())
    }

    async fn remove_line(&self, item_id: ItemId) -> Result<()> {
        let resp = self
            .client
            .delete(self.url())
            .query(&[("itemId", item_id.to_string())])
            .bearer_auth(&self.token)
            .send()
            .await?;
        read_outcome(resp).await.map(|_| ())
    }

    async fn clear(&self) -> Result<()> {
        let resp = self.client.delete(self.url()).bearer_auth(&self.token).send().await?;
        read_outcome(resp).await.map(|_| ())
    }
}

/// Maps a `{ ok, error }` envelope and status code back into the crate error.
async fn read_outcome(resp: Response) -> Result<Value> {
    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    let ok = body.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if status.is_success() && ok {
        return Ok(body);
    }
    let reason = body.get("error").and_then(Value::as_str).unwrap_or("request failed").to_string();
    Err(match status {
        StatusCode::UNAUTHORIZED => StorefrontError::Unauthorized,
        StatusCode::NOT_FOUND => StorefrontError::NotFound(reason),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => StorefrontError::validation("request", reason),
        StatusCode::CONFLICT => StorefrontError::Conflict(reason),
        _ => StorefrontError::Transport(format!("{status}: {reason}")),
    })
}

/// Malformed snapshots are an error so callers keep their current view.
fn parse_snapshot(body: &Value) -> Result<CartSnapshot> {
    let lines = body.get("lines").unwrap_or(&Value::Null);
    let mut cart = Cart::new();
    if !cart.replace_from_snapshot(lines) {
        return Err(StorefrontError::Transport("malformed cart snapshot".to_string()));
    }
    Ok(CartSnapshot::from_lines(cart.lines().iter().map(SnapshotLine::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::CatalogItem;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_parse_snapshot_reads_server_rows() {
        let id = ItemId::new();
        let body = json!({ "ok": true, "lines": [{ "itemId": id.to_string(), "qty": 2, "title": "Mug", "price": 499 }], "subtotal": 998 });
        let snap = parse_snapshot(&body).unwrap();
        assert_eq!(snap.qty_of(id).map(|q| q.value()), Some(2));
        assert_eq!(snap.subtotal, 998);
    }

    #[test]
    fn test_parse_snapshot_rejects_garbage() {
        assert!(parse_snapshot(&json!({ "ok": true })).is_err());
        assert!(parse_snapshot(&json!({ "ok": true, "lines": [{ "bogus": 1 }] })).is_err());
        assert!(parse_snapshot(&json!({ "ok": true, "lines": [] })).unwrap().lines.is_empty());
    }

    #[tokio::test]
    async fn test_actor_cart_round_trip() {
        let store = Arc::new(InMemoryStore::new());
        let mug = store.insert_item(CatalogItem::new("Mug", 499, "INR")).await;
        let cart = ActorCart::new(CartService::new(store.clone(), store.clone()), ActorId::new());
        cart.add_line(mug, Quantity::clamped(2)).await.unwrap();
        cart.update_line(mug, 4).await.unwrap();
        assert_eq!(cart.snapshot().await.unwrap().qty_of(mug).map(|q| q.value()), Some(4));
        cart.remove_line(mug).await.unwrap();
        cart.remove_line(mug).await.unwrap();
        assert!(cart.snapshot().await.unwrap().lines.is_empty());
    }

    #[tokio::test]
    async fn test_http_client_against_router() {
        use crate::http::tests::{token_for, TestApp};

        let app = TestApp::new().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = crate::http::router(app.state.clone());
        tokio::spawn(async move { axum::serve(listener, router).await });

        let base = format!("http://{addr}");
        let actor = ActorId::new();
        let cart = HttpCartClient::new(Client::new(), base.as_str(), token_for(json!({ "sub": actor })));

        cart.add_line(app.lamp, Quantity::clamped(2)).await.unwrap();
        cart.add_line(app.lamp, Quantity::clamped(1)).await.unwrap();
        cart.add_line(app.rug, Quantity::clamped(1)).await.unwrap();
        let snap = cart.snapshot().await.unwrap();
        assert_eq!(snap.qty_of(app.lamp).map(|q| q.value()), Some(3));
        assert_eq!(snap.subtotal, 3 * 1999 + 2999);

        cart.update_line(app.lamp, 5).await.unwrap();
        assert_eq!(cart.snapshot().await.unwrap().qty_of(app.lamp).map(|q| q.value()), Some(5));
        assert!(matches!(cart.update_line(app.lamp, 150).await, Err(StorefrontError::Validation { .. })));
        assert!(matches!(cart.update_line(ItemId::new(), 1).await, Err(StorefrontError::NotFound(_))));

        cart.remove_line(app.rug).await.unwrap();
        assert_eq!(cart.snapshot().await.unwrap().lines.len(), 1);
        cart.clear().await.unwrap();
        assert!(cart.snapshot().await.unwrap().lines.is_empty());

        let stranger = HttpCartClient::new(Client::new(), base, "not-a-token");
        assert!(matches!(stranger.snapshot().await, Err(StorefrontError::Unauthorized)));
        assert!(matches!(stranger.add_line(app.lamp, Quantity::clamped(1)).await, Err(StorefrontError::Unauthorized)));
    }
}
