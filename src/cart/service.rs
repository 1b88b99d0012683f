//! Server-side cart operations, always scoped to one authenticated actor.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::aggregates::{CartLine, ItemSnapshot};
use crate::domain::pricing::DEFAULT_CURRENCY;
use crate::domain::value_objects::{ActorId, ItemId, Quantity};
use crate::ports::{Catalog, CartRepository};
use crate::{Result, StorefrontError};

const UNAVAILABLE_TITLE: &str = "Unavailable item";

/// A cart line joined with live catalog data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotLine {
    pub item_id: ItemId,
    pub qty: Quantity,
    pub title: String,
    pub price: i64,
    pub currency: String,
    pub image_url: Option<String>,
}

impl From<SnapshotLine> for CartLine {
    fn from(l: SnapshotLine) -> Self {
        CartLine { item: ItemSnapshot { id: l.item_id, title: l.title, price: l.price, currency: l.currency, image_url: l.image_url }, qty: l.qty }
    }
}

impl From<&CartLine> for SnapshotLine {
    fn from(l: &CartLine) -> Self {
        SnapshotLine { item_id: l.item.id, qty: l.qty, title: l.item.title.clone(), price: l.item.price, currency: l.item.currency.clone(), image_url: l.item.image_url.clone() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<SnapshotLine>,
    pub subtotal: i64,
}

impl CartSnapshot {
    pub fn from_lines(lines: Vec<SnapshotLine>) -> Self {
        let subtotal = lines.iter().fold(0i64, |acc, l| acc.saturating_add(l.price.saturating_mul(l.qty.value() as i64)));
        Self { lines, subtotal }
    }

    pub fn qty_of(&self, item_id: ItemId) -> Option<Quantity> {
        self.lines.iter().find(|l| l.item_id == item_id).map(|l| l.qty)
    }

    pub fn cart_lines(&self) -> Vec<CartLine> { self.lines.iter().cloned().map(CartLine::from).collect() }
}

/// Result of a quantity update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineUpdate { Updated(Quantity), Removed }

#[derive(Clone)]
pub struct CartService {
    catalog: Arc<dyn Catalog>,
    carts: Arc<dyn CartRepository>,
}

impl CartService {
    pub fn new(catalog: Arc<dyn Catalog>, carts: Arc<dyn CartRepository>) -> Self { Self { catalog, carts } }

    /// Lines whose item vanished from the catalog show as unavailable and price 0.
    pub async fn snapshot(&self, actor: ActorId) -> Result<CartSnapshot> {
        let stored = self.carts.get_lines(actor).await?;
        let ids: Vec<ItemId> = stored.iter().map(|l| l.item_id).collect();
        let items = if ids.is_empty() { Default::default() } else { self.catalog.resolve_items(&ids).await? };
        let lines = stored
            .into_iter()
            .map(|l| match items.get(&l.item_id) {
                Some(item) => SnapshotLine {
                    item_id: l.item_id, qty: l.qty, title: item.title.clone(), price: item.price.amount(),
                    currency: item.price.currency().to_string(), image_url: item.image_url.clone(),
                },
                None => SnapshotLine {
                    item_id: l.item_id, qty: l.qty, title: UNAVAILABLE_TITLE.to_string(), price: 0,
                    currency: DEFAULT_CURRENCY.to_string(), image_url: None,
                },
            })
            .collect();
        Ok(CartSnapshot::from_lines(lines))
    }

    /// Adds to an existing line (sum clamped to 99) or creates it. `qty` must be within `1..=99`.
    pub async fn add_line(&self, actor: ActorId, item_id: ItemId, qty: i64) -> Result<CartSnapshot> {
        let qty = Quantity::try_new(qty).ok_or(StorefrontError::InvalidQuantity(qty))?;
        let found = self.catalog.resolve_items(&[item_id]).await?;
        if !found.contains_key(&item_id) {
            return Err(StorefrontError::NotFound("Item not found".to_string()));
        }
        let next = match self.carts.get_line(actor, item_id).await? {
            Some(existing) => existing.qty.saturating_add(qty),
            None => qty,
        };
        self.carts.upsert_line(actor, item_id, next).await?;
        tracing::debug!(%actor, %item_id, qty = next.value(), "Cart line added");
        self.snapshot(actor).await
    }

    /// Replaces a line's quantity; `0` removes it. The line must exist.
    pub async fn update_line(&self, actor: ActorId, item_id: ItemId, qty: i64) -> Result<LineUpdate> {
        if !(0..=Quantity::MAX as i64).contains(&qty) {
            return Err(StorefrontError::InvalidQuantity(qty));
        }
        if self.carts.get_line(actor, item_id).await?.is_none() {
            return Err(StorefrontError::NotFound("Line not found".to_string()));
        }
        if qty == 0 {
            self.carts.delete_line(actor, item_id).await?;
            tracing::debug!(%actor, %item_id, "Cart line removed by quantity");
            return Ok(LineUpdate::Removed);
        }
        let q = Quantity::clamped(qty);
        self.carts.upsert_line(actor, item_id, q).await?;
        tracing::debug!(%actor, %item_id, qty = q.value(), "Cart line updated");
        Ok(LineUpdate::Updated(q))
    }

    /// Idempotent: removing an absent line succeeds. Returns whether a line existed.
    pub async fn remove_line(&self, actor: ActorId, item_id: ItemId) -> Result<bool> {
        self.carts.delete_line(actor, item_id).await
    }

    pub async fn clear(&self, actor: ActorId) -> Result<()> {
        self.carts.clear_lines(actor).await
    }
}
