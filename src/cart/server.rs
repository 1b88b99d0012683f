//! Member cart: every mutation is a server round-trip, after which the
//! authoritative snapshot is mirrored into local storage.

use std::sync::Arc;

use crate::cart::local::{LocalCart, LocalStorage};
use crate::cart::remote::RemoteCart;
use crate::domain::aggregates::{Cart, ItemSnapshot};
use crate::domain::value_objects::{ActorId, ItemId, Quantity};
use crate::{Result, StorefrontError};

pub struct ServerCart<S> {
    remote: Arc<dyn RemoteCart>,
    actor: ActorId,
    mirror: LocalCart<S>,
}

impl<S: LocalStorage> ServerCart<S> {
    /// Takes over the local cart as the mirror. Call [`ServerCart::refresh`] to load the server view.
    pub fn new(remote: Arc<dyn RemoteCart>, actor: ActorId, mirror: LocalCart<S>) -> Self {
        Self { remote, actor, mirror }
    }

    pub fn actor(&self) -> ActorId { self.actor }
    pub fn remote(&self) -> &Arc<dyn RemoteCart> { &self.remote }
    pub fn cart(&self) -> &Cart { self.mirror.cart() }

    /// Hands back the mirror, keeping whatever it last held.
    pub fn into_local(self) -> LocalCart<S> { self.mirror }

    pub(crate) fn mirror_mut(&mut self) -> &mut LocalCart<S> { &mut self.mirror }

    /// Replaces the mirror with the server snapshot. On failure the mirror is untouched.
    pub async fn refresh(&mut self) -> Result<()> {
        let snapshot = self.remote.snapshot().await?;
        self.mirror.mirror(self.actor, snapshot.cart_lines())
    }

    pub async fn add(&mut self, item: ItemSnapshot, quantity: i64) -> Result<()> {
        self.remote.add_line(item.id, Quantity::clamped(quantity)).await?;
        self.refresh().await
    }

    /// `quantity <= 0` removes; an item not on the server is ignored.
    pub async fn set_quantity(&mut self, item_id: ItemId, quantity: i64) -> Result<()> {
        if quantity <= 0 {
            return self.remove(item_id).await;
        }
        match self.remote.update_line(item_id, Quantity::clamped(quantity).value()).await {
            Ok(()) | Err(StorefrontError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.refresh().await
    }

    pub async fn remove(&mut self, item_id: ItemId) -> Result<()> {
        self.remote.remove_line(item_id).await?;
        self.refresh().await
    }

    /// Empties the local view only; the server cart is cleared by checkout or [`ServerCart::clear_remote`].
    pub fn clear(&mut self) -> Result<()> {
        self.mirror.clear()
    }

    pub async fn clear_remote(&mut self) -> Result<()> {
        self.remote.clear().await?;
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::local::MemoryStorage;
    use crate::cart::remote::ActorCart;
    use crate::cart::service::{CartService, CartSnapshot};
    use crate::domain::aggregates::CatalogItem;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl RemoteCart for Offline {
        async fn snapshot(&self) -> Result<CartSnapshot> { Err(StorefrontError::Transport("offline".into())) }
        async fn add_line(&self, _: ItemId, _: Quantity) -> Result<()> { Err(StorefrontError::Transport("offline".into())) }
        async fn update_line(&self, _: ItemId, _: u32) -> Result<()> { Err(StorefrontError::Transport("offline".into())) }
        async fn remove_line(&self, _: ItemId) -> Result<()> { Err(StorefrontError::Transport("offline".into())) }
        async fn clear(&self) -> Result<()> { Err(StorefrontError::Transport("offline".into())) }
    }

    #[tokio::test]
    async fn test_mutations_mirror_server() {
        let store = Arc::new(InMemoryStore::new());
        let lamp = store.insert_item(CatalogItem::new("Lamp", 1999, "INR")).await;
        let actor = ActorId::new();
        let remote = Arc::new(ActorCart::new(CartService::new(store.clone(), store.clone()), actor));
        let mut cart = ServerCart::new(remote, actor, LocalCart::open(MemoryStorage::new()));

        let item = CatalogItem::new("Lamp", 1, "INR").snapshot();
        let item = ItemSnapshot { id: lamp, ..item };
        cart.add(item.clone(), 2).await.unwrap();
        cart.add(item, 3).await.unwrap();
        // price comes from the server, not the caller
        assert_eq!(cart.cart().subtotal(), 1999 * 5);

        cart.set_quantity(lamp, 0).await.unwrap();
        assert!(cart.cart().is_empty());
        cart.set_quantity(ItemId::new(), 3).await.unwrap();
        assert!(cart.cart().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_prior_view() {
        let mut local = LocalCart::open(MemoryStorage::new());
        local.add(CatalogItem::new("Tea", 250, "INR").snapshot(), 2).unwrap();
        let mut cart = ServerCart::new(Arc::new(Offline), ActorId::new(), local);
        assert!(cart.add(CatalogItem::new("Mug", 499, "INR").snapshot(), 1).await.is_err());
        assert!(cart.refresh().await.is_err());
        assert_eq!(cart.cart().subtotal(), 500);
    }
}
