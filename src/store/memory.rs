//! In-process store implementing every persistence port. Used by tests and by
//! the binary when no `DATABASE_URL` is configured.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::aggregates::{CatalogItem, Order, PaymentUpdate};
use crate::domain::value_objects::{ActorId, ItemId, OrderId, Quantity};
use crate::ports::{Catalog, CartRepository, ItemPage, ItemQuery, ItemSort, OrderPage, OrderRepository, StoredLine};
use crate::{Result, StorefrontError};

#[derive(Debug, Default)]
struct State {
    items: HashMap<ItemId, CatalogItem>,
    carts: HashMap<ActorId, Vec<StoredLine>>,
    orders: Vec<Order>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn insert_item(&self, item: CatalogItem) -> ItemId {
        let id = item.id;
        self.state.write().await.items.insert(id, item);
        id
    }

    /// Inserts, or replaces the item with the same slug while keeping its id.
    pub async fn upsert_item(&self, mut item: CatalogItem) -> ItemId {
        let mut state = self.state.write().await;
        if let Some(existing) = state.items.values().find(|i| i.slug == item.slug) {
            item.id = existing.id;
            item.created_at = existing.created_at;
        }
        let id = item.id;
        state.items.insert(id, item);
        id
    }

    pub async fn remove_item(&self, id: ItemId) -> Option<CatalogItem> {
        self.state.write().await.items.remove(&id)
    }

    pub async fn order_count(&self) -> usize { self.state.read().await.orders.len() }
}

#[async_trait]
impl Catalog for InMemoryStore {
    async fn resolve_items(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, CatalogItem>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.items.get(id).map(|i| (*id, i.clone()))).collect())
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage> {
        let state = self.state.read().await;
        let mut found: Vec<&CatalogItem> = state.items.values().filter(|i| query.matches(i)).collect();
        match query.sort {
            ItemSort::New => found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))),
            ItemSort::PriceAsc => found.sort_by(|a, b| a.price.amount().cmp(&b.price.amount()).then_with(|| a.id.cmp(&b.id))),
            ItemSort::PriceDesc => found.sort_by(|a, b| b.price.amount().cmp(&a.price.amount()).then_with(|| a.id.cmp(&b.id))),
        }
        let total = found.len() as i64;
        let items = found.into_iter().skip(query.offset.max(0) as usize).take(query.limit.max(0) as usize).cloned().collect();
        Ok(ItemPage { items, total })
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn get_lines(&self, actor: ActorId) -> Result<Vec<StoredLine>> {
        Ok(self.state.read().await.carts.get(&actor).cloned().unwrap_or_default())
    }

    async fn upsert_line(&self, actor: ActorId, item_id: ItemId, qty: Quantity) -> Result<()> {
        let mut state = self.state.write().await;
        let lines = state.carts.entry(actor).or_default();
        match lines.iter_mut().find(|l| l.item_id == item_id) {
            Some(line) => line.qty = qty,
            None => lines.push(StoredLine { item_id, qty }),
        }
        Ok(())
    }

    async fn delete_line(&self, actor: ActorId, item_id: ItemId) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(lines) = state.carts.get_mut(&actor) else { return Ok(false) };
        let before = lines.len();
        lines.retain(|l| l.item_id != item_id);
        Ok(lines.len() != before)
    }

    async fn clear_lines(&self, actor: ActorId) -> Result<()> {
        self.state.write().await.carts.remove(&actor);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create_order(&self, order: &Order) -> Result<OrderId> {
        let mut state = self.state.write().await;
        if state.orders.iter().any(|o| o.id == order.id) {
            return Err(StorefrontError::Conflict(format!("Order {} already exists", order.id)));
        }
        state.orders.push(order.clone());
        Ok(order.id)
    }

    async fn get_order(&self, id: OrderId, actor: Option<ActorId>) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id && o.visible_to(actor)).cloned())
    }

    async fn update_order_payment(&self, id: OrderId, update: &PaymentUpdate) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StorefrontError::NotFound("Order not found".to_string()))?;
        order.status = update.status;
        order.payment_status = update.payment_status;
        order.payment_method = update.payment_method;
        order.payment_ref = update.payment_ref.clone();
        order.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn list_orders(&self, actor: ActorId, offset: i64, limit: i64) -> Result<OrderPage> {
        let state = self.state.read().await;
        let mut mine: Vec<&Order> = state.orders.iter().filter(|o| o.actor == Some(actor)).collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        let total = mine.len() as i64;
        let orders = mine.into_iter().skip(offset.max(0) as usize).take(limit.max(0) as usize).cloned().collect();
        Ok(OrderPage { orders, total })
    }
}
