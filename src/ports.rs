//! Capability contracts the core consumes: catalog lookup, cart persistence and
//! order persistence. Every cart and order query is scoped by the actor.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::aggregates::{CatalogItem, Order, PaymentUpdate};
use crate::domain::value_objects::{ActorId, ItemId, OrderId, Quantity};
use crate::Result;

/// A persisted cart row: `(actor, item)` is unique.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoredLine {
    pub item_id: ItemId,
    pub qty: Quantity,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ItemSort {
    /// Newest first.
    #[default]
    New,
    PriceAsc,
    PriceDesc,
}

impl ItemSort {
    /// `price-asc` and `price-desc`; anything else sorts newest first.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "price-asc" => Self::PriceAsc,
            "price-desc" => Self::PriceDesc,
            _ => Self::New,
        }
    }
}

/// Catalog listing filter. Text and category match case-insensitive substrings;
/// price bounds are inclusive, in minor units.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemQuery {
    pub text: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: ItemSort,
    pub offset: i64,
    pub limit: i64,
}

impl ItemQuery {
    pub fn matches(&self, item: &CatalogItem) -> bool {
        let contains = |hay: Option<&str>, needle: &str| hay.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()));
        self.text.as_deref().map_or(true, |t| contains(Some(&item.title), t) || contains(item.description.as_deref(), t))
            && self.category.as_deref().map_or(true, |c| contains(item.category.as_deref(), c))
            && self.min_price.map_or(true, |min| item.price.amount() >= min)
            && self.max_price.map_or(true, |max| item.price.amount() <= max)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ItemPage {
    pub items: Vec<CatalogItem>,
    pub total: i64,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolves ids to catalog items. Unknown ids are simply absent from the map.
    async fn resolve_items(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, CatalogItem>>;
    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage>;

    async fn get_item(&self, id: ItemId) -> Result<Option<CatalogItem>> {
        Ok(self.resolve_items(&[id]).await?.remove(&id))
    }
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get_lines(&self, actor: ActorId) -> Result<Vec<StoredLine>>;
    /// Inserts or overwrites the quantity of one line.
    async fn upsert_line(&self, actor: ActorId, item_id: ItemId, qty: Quantity) -> Result<()>;
    /// Returns whether a row was deleted.
    async fn delete_line(&self, actor: ActorId, item_id: ItemId) -> Result<bool>;
    async fn clear_lines(&self, actor: ActorId) -> Result<()>;

    async fn get_line(&self, actor: ActorId, item_id: ItemId) -> Result<Option<StoredLine>> {
        Ok(self.get_lines(actor).await?.into_iter().find(|l| l.item_id == item_id))
    }
}

/// One page of an actor's order history, newest first.
#[derive(Clone, Debug, Default)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Writes the order and all its lines atomically.
    async fn create_order(&self, order: &Order) -> Result<OrderId>;
    /// Fetches an order only if `actor` may see it; otherwise `None`.
    async fn get_order(&self, id: OrderId, actor: Option<ActorId>) -> Result<Option<Order>>;
    async fn update_order_payment(&self, id: OrderId, update: &PaymentUpdate) -> Result<()>;
    /// `offset`/`limit` page over the actor's orders, each with its frozen lines.
    async fn list_orders(&self, actor: ActorId, offset: i64, limit: i64) -> Result<OrderPage>;
}
