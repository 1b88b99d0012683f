//! Reconciliation Engine
//!
//! Runs once right after login. The guest's additions are summed into the
//! member's server cart (clamped to 99), then the server snapshot is mirrored
//! back into local storage. The mirrored quantities become the baseline, so a
//! second pass with no new guest activity changes nothing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cart::local::{LocalCart, LocalStorage};
use crate::cart::remote::RemoteCart;
use crate::domain::value_objects::{ActorId, ItemId, Quantity};
use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Lines the server rejected outright (e.g. items gone from the catalog).
    pub skipped: Vec<ItemId>,
}

#[derive(Clone)]
pub struct Reconciler {
    remote: Arc<dyn RemoteCart>,
    actor: ActorId,
}

impl Reconciler {
    pub fn new(remote: Arc<dyn RemoteCart>, actor: ActorId) -> Self { Self { remote, actor } }

    /// Merges `local` into the server cart and mirrors the result back.
    ///
    /// Transient failures abort the pass. Each applied line is settled into the
    /// local baseline as soon as the server accepts it, so a re-run only sends
    /// what is still outstanding and converges on the same server cart.
    pub async fn run<S: LocalStorage>(&self, local: &mut LocalCart<S>) -> Result<ReconcileReport> {
        let contributions = local.pending_contributions(self.actor);
        let server: HashMap<ItemId, Quantity> =
            self.remote.snapshot().await?.lines.into_iter().map(|l| (l.item_id, l.qty)).collect();

        let mut report = ReconcileReport::default();
        for (item_id, merged) in merge(&server, &contributions) {
            let applied = match server.get(&item_id) {
                None => self.remote.add_line(item_id, merged).await.map(|_| &mut report.added),
                Some(current) if *current != merged => {
                    self.remote.update_line(item_id, merged.value()).await.map(|_| &mut report.updated)
                }
                Some(_) => Ok(&mut report.unchanged),
            };
            match applied {
                Ok(counter) => {
                    *counter += 1;
                    local.settle(self.actor, item_id)?;
                    tracing::debug!(actor = %self.actor, %item_id, qty = merged.value(), "Reconciled cart line");
                }
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    tracing::warn!(actor = %self.actor, %item_id, error = %e, "Skipping cart line during reconciliation");
                    report.skipped.push(item_id);
                }
            }
        }

        let snapshot = self.remote.snapshot().await?;
        local.mirror(self.actor, snapshot.cart_lines())?;
        tracing::info!(
            actor = %self.actor,
            added = report.added,
            updated = report.updated,
            skipped = report.skipped.len(),
            "Cart reconciled"
        );
        Ok(report)
    }

    /// Logout counterpart: best-effort mirror of the latest server view. Never clears lines.
    pub async fn mirror_for_logout<S: LocalStorage>(&self, local: &mut LocalCart<S>) {
        let mirrored = match self.remote.snapshot().await {
            Ok(snapshot) => local.mirror(self.actor, snapshot.cart_lines()),
            Err(e) => Err(e),
        };
        if let Err(e) = mirrored {
            tracing::warn!(actor = %self.actor, error = %e, "Keeping last local cart at logout");
        }
    }
}

/// Server quantities plus local contributions, each clamped to 99.
/// Only items touched by `local` are returned, ordered by id for stable application.
fn merge(server: &HashMap<ItemId, Quantity>, local: &HashMap<ItemId, Quantity>) -> Vec<(ItemId, Quantity)> {
    let mut merged: Vec<(ItemId, Quantity)> = local
        .iter()
        .map(|(id, q)| (*id, server.get(id).map_or(*q, |s| s.saturating_add(*q))))
        .collect();
    merged.sort_by_key(|(id, _)| *id);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::local::MemoryStorage;
    use crate::cart::remote::ActorCart;
    use crate::cart::service::{CartService, CartSnapshot};
    use crate::domain::aggregates::{CatalogItem, ItemSnapshot};
    use crate::store::InMemoryStore;
    use crate::StorefrontError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct World {
        store: Arc<InMemoryStore>,
        service: CartService,
        actor: ActorId,
    }

    impl World {
        async fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            let service = CartService::new(store.clone(), store.clone());
            Self { store, service, actor: ActorId::new() }
        }

        async fn item(&self, title: &str, price: i64) -> ItemSnapshot {
            let item = CatalogItem::new(title, price, "INR");
            let snapshot = item.snapshot();
            self.store.insert_item(item).await;
            snapshot
        }

        fn reconciler(&self) -> Reconciler {
            Reconciler::new(Arc::new(ActorCart::new(self.service.clone(), self.actor)), self.actor)
        }

        async fn server_qty(&self, id: ItemId) -> Option<u32> {
            self.service.snapshot(self.actor).await.unwrap().qty_of(id).map(|q| q.value())
        }
    }

    #[tokio::test]
    async fn test_merge_is_additive() {
        let w = World::new().await;
        let a = w.item("A", 100).await;
        w.service.add_line(w.actor, a.id, 3).await.unwrap();

        let mut local = LocalCart::open(MemoryStorage::new());
        local.add(a.clone(), 2).unwrap();
        let report = w.reconciler().run(&mut local).await.unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(w.server_qty(a.id).await, Some(5));
        assert_eq!(local.cart().get(a.id).map(|l| l.qty.value()), Some(5));
    }

    #[tokio::test]
    async fn test_guest_and_member_hold_same_item() {
        let w = World::new().await;
        let x = w.item("X", 100).await;
        let y = w.item("Y", 50).await;
        w.service.add_line(w.actor, x.id, 1).await.unwrap();

        let mut local = LocalCart::open(MemoryStorage::new());
        local.add(x.clone(), 1).unwrap();
        local.add(y.clone(), 4).unwrap();
        let report = w.reconciler().run(&mut local).await.unwrap();

        assert_eq!((report.added, report.updated), (1, 1));
        assert_eq!(w.server_qty(x.id).await, Some(2));
        assert_eq!(w.server_qty(y.id).await, Some(4));
        assert_eq!(local.cart().subtotal(), 2 * 100 + 4 * 50);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let w = World::new().await;
        let a = w.item("A", 100).await;
        w.service.add_line(w.actor, a.id, 3).await.unwrap();
        let mut local = LocalCart::open(MemoryStorage::new());
        local.add(a.clone(), 2).unwrap();

        let reconciler = w.reconciler();
        reconciler.run(&mut local).await.unwrap();
        let second = reconciler.run(&mut local).await.unwrap();

        assert_eq!(second, ReconcileReport::default());
        assert_eq!(w.server_qty(a.id).await, Some(5));
    }

    #[tokio::test]
    async fn test_empty_local_is_noop_and_mirrors() {
        let w = World::new().await;
        let a = w.item("A", 100).await;
        w.service.add_line(w.actor, a.id, 7).await.unwrap();
        let mut local = LocalCart::open(MemoryStorage::new());

        let report = w.reconciler().run(&mut local).await.unwrap();
        assert_eq!(report, ReconcileReport::default());
        assert_eq!(local.cart().get(a.id).map(|l| l.qty.value()), Some(7));
    }

    #[tokio::test]
    async fn test_sum_clamps_at_max() {
        let w = World::new().await;
        let a = w.item("A", 1).await;
        w.service.add_line(w.actor, a.id, 90).await.unwrap();
        let mut local = LocalCart::open(MemoryStorage::new());
        local.add(a.clone(), 20).unwrap();
        w.reconciler().run(&mut local).await.unwrap();
        assert_eq!(w.server_qty(a.id).await, Some(99));
    }

    #[tokio::test]
    async fn test_vanished_item_is_skipped() {
        let w = World::new().await;
        let a = w.item("A", 100).await;
        let gone = CatalogItem::new("Gone", 10, "INR").snapshot();
        let mut local = LocalCart::open(MemoryStorage::new());
        local.add(a.clone(), 1).unwrap();
        local.add(gone.clone(), 1).unwrap();

        let report = w.reconciler().run(&mut local).await.unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.skipped, vec![gone.id]);
        assert!(local.cart().get(gone.id).is_none());
    }

    /// Fails the first `add_line` with a transport error, then delegates.
    struct FlakyAdd {
        inner: ActorCart,
        failed: AtomicBool,
    }

    #[async_trait]
    impl RemoteCart for FlakyAdd {
        async fn snapshot(&self) -> Result<CartSnapshot> { self.inner.snapshot().await }
        async fn add_line(&self, item_id: ItemId, qty: Quantity) -> Result<()> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(StorefrontError::Transport("connection reset".into()));
            }
            self.inner.add_line(item_id, qty).await
        }
        async fn update_line(&self, item_id: ItemId, qty: u32) -> Result<()> { self.inner.update_line(item_id, qty).await }
        async fn remove_line(&self, item_id: ItemId) -> Result<()> { self.inner.remove_line(item_id).await }
        async fn clear(&self) -> Result<()> { self.inner.clear().await }
    }

    #[tokio::test]
    async fn test_retry_after_partial_pass_converges() {
        let w = World::new().await;
        let a = w.item("A", 100).await;
        let b = w.item("B", 50).await;
        w.service.add_line(w.actor, a.id, 3).await.unwrap();
        let mut local = LocalCart::open(MemoryStorage::new());
        local.add(a.clone(), 2).unwrap();
        local.add(b.clone(), 1).unwrap();

        let remote = Arc::new(FlakyAdd { inner: ActorCart::new(w.service.clone(), w.actor), failed: AtomicBool::new(false) });
        let reconciler = Reconciler::new(remote, w.actor);
        assert!(matches!(reconciler.run(&mut local).await, Err(StorefrontError::Transport(_))));
        reconciler.run(&mut local).await.unwrap();

        assert_eq!(w.server_qty(a.id).await, Some(5));
        assert_eq!(w.server_qty(b.id).await, Some(1));
        assert_eq!(reconciler.run(&mut local).await.unwrap(), ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_logout_mirror_keeps_lines() {
        let w = World::new().await;
        let a = w.item("A", 100).await;
        w.service.add_line(w.actor, a.id, 2).await.unwrap();
        let mut local = LocalCart::open(MemoryStorage::new());
        w.reconciler().mirror_for_logout(&mut local).await;
        assert_eq!(local.cart().len(), 1);
    }
}
