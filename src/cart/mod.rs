//! Cart Store
//!
//! A session picks one backend when it starts: the guest [`LocalCart`] or the
//! member [`ServerCart`]. Call sites only see [`CartBackend`].

use async_trait::async_trait;

pub mod local;
pub mod remote;
pub mod server;
pub mod service;

pub use local::{JsonFileStorage, LocalCart, LocalStorage, MemoryStorage};
pub use remote::{ActorCart, HttpCartClient, RemoteCart};
pub use server::ServerCart;
pub use service::{CartService, CartSnapshot, LineUpdate, SnapshotLine};

use crate::domain::aggregates::{Cart, ItemSnapshot};
use crate::domain::value_objects::ItemId;
use crate::Result;

#[async_trait]
pub trait CartBackend: Send {
    /// Current view of the lines.
    fn view(&self) -> &Cart;
    async fn add(&mut self, item: ItemSnapshot, quantity: i64) -> Result<()>;
    async fn set_quantity(&mut self, item_id: ItemId, quantity: i64) -> Result<()>;
    async fn remove(&mut self, item_id: ItemId) -> Result<()>;
    /// Empties the in-memory view.
    async fn clear(&mut self) -> Result<()>;
    /// Reloads from the source of truth; a no-op for the local backend.
    async fn refresh(&mut self) -> Result<()>;

    fn subtotal(&self) -> i64 { self.view().subtotal() }
}

#[async_trait]
impl<S: LocalStorage> CartBackend for LocalCart<S> {
    fn view(&self) -> &Cart { self.cart() }

    async fn add(&mut self, item: ItemSnapshot, quantity: i64) -> Result<()> {
        LocalCart::add(self, item, quantity)
    }

    async fn set_quantity(&mut self, item_id: ItemId, quantity: i64) -> Result<()> {
        LocalCart::set_quantity(self, item_id, quantity)
    }

    async fn remove(&mut self, item_id: ItemId) -> Result<()> {
        LocalCart::remove(self, item_id)
    }

    async fn clear(&mut self) -> Result<()> {
        LocalCart::clear(self)
    }

    async fn refresh(&mut self) -> Result<()> { Ok(()) }
}

#[async_trait]
impl<S: LocalStorage> CartBackend for ServerCart<S> {
    fn view(&self) -> &Cart { self.cart() }

    async fn add(&mut self, item: ItemSnapshot, quantity: i64) -> Result<()> {
        ServerCart::add(self, item, quantity).await
    }

    async fn set_quantity(&mut self, item_id: ItemId, quantity: i64) -> Result<()> {
        ServerCart::set_quantity(self, item_id, quantity).await
    }

    async fn remove(&mut self, item_id: ItemId) -> Result<()> {
        ServerCart::remove(self, item_id).await
    }

    async fn clear(&mut self) -> Result<()> {
        ServerCart::clear(self)
    }

    async fn refresh(&mut self) -> Result<()> {
        ServerCart::refresh(self).await
    }
}
