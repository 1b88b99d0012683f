//! Guest cart persisted to per-browser storage.
//!
//! The stored document keeps the lines and, once the cart has mirrored a
//! member's server cart, the quantities it mirrored (the baseline). Only
//! quantities above that baseline count as guest additions at the next login.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::domain::aggregates::{Cart, CartLine, ItemSnapshot};
use crate::domain::value_objects::{ActorId, ItemId, Quantity};
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalCartDocument {
    pub cart: Cart,
    #[serde(default)]
    pub baseline: Option<Baseline>,
}

/// Server quantities last mirrored into local storage for an actor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub actor: ActorId,
    pub quantities: HashMap<ItemId, Quantity>,
}

/// Durable per-browser storage. Writes are synchronous.
pub trait LocalStorage: Send + Sync {
    fn load(&self) -> Result<Option<LocalCartDocument>>;
    fn save(&self, doc: &LocalCartDocument) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }
}

impl LocalStorage for MemoryStorage {
    fn load(&self) -> Result<Option<LocalCartDocument>> {
        let slot = self.slot.lock().map_err(|_| StorefrontError::Storage("local storage poisoned".into()))?;
        Ok(slot.as_deref().and_then(|raw| serde_json::from_str(raw).ok()))
    }

    fn save(&self, doc: &LocalCartDocument) -> Result<()> {
        let raw = serde_json::to_string(doc).map_err(|e| StorefrontError::Storage(e.to_string()))?;
        *self.slot.lock().map_err(|_| StorefrontError::Storage("local storage poisoned".into()))? = Some(raw);
        Ok(())
    }
}

/// One JSON file per profile.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

impl LocalStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<LocalCartDocument>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorefrontError::Storage(e.to_string())),
        };
        match serde_json::from_str(&raw) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Discarding unreadable local cart");
                Ok(None)
            }
        }
    }

    fn save(&self, doc: &LocalCartDocument) -> Result<()> {
        let raw = serde_json::to_vec_pretty(doc).map_err(|e| StorefrontError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(|e| StorefrontError::Storage(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StorefrontError::Storage(e.to_string()))
    }
}

#[derive(Debug)]
pub struct LocalCart<S> {
    doc: LocalCartDocument,
    storage: S,
}

impl<S: LocalStorage> LocalCart<S> {
    /// Loads the persisted cart, starting empty if nothing usable is stored.
    pub fn open(storage: S) -> Self {
        let doc = storage.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Local cart unavailable, starting empty");
            None
        });
        let mut doc = doc.unwrap_or_default();
        // stored documents may hold duplicate lines; fold them on load
        let lines = doc.cart.lines().to_vec();
        doc.cart.replace_lines(lines);
        Self { doc, storage }
    }

    pub fn cart(&self) -> &Cart { &self.doc.cart }
    pub fn baseline(&self) -> Option<&Baseline> { self.doc.baseline.as_ref() }
    pub fn storage(&self) -> &S { &self.storage }

    pub fn add(&mut self, item: ItemSnapshot, quantity: i64) -> Result<()> {
        self.commit(|doc| doc.cart.add(item, quantity))
    }

    pub fn set_quantity(&mut self, item_id: ItemId, quantity: i64) -> Result<()> {
        self.commit(|doc| doc.cart.set_quantity(item_id, quantity))
    }

    pub fn remove(&mut self, item_id: ItemId) -> Result<()> {
        self.commit(|doc| { doc.cart.remove(item_id); })
    }

    pub fn clear(&mut self) -> Result<()> {
        self.commit(|doc| doc.cart.clear())
    }

    /// Replaces the lines with an authoritative server view and records it as the baseline.
    pub fn mirror(&mut self, actor: ActorId, lines: Vec<CartLine>) -> Result<()> {
        self.commit(|doc| {
            doc.cart.replace_lines(lines);
            doc.baseline = Some(Baseline { actor, quantities: doc.cart.quantities() });
        })
    }

    /// Untrusted-payload variant of [`LocalCart::mirror`]; malformed input changes nothing.
    pub fn mirror_snapshot(&mut self, actor: ActorId, snapshot: &Value) -> Result<bool> {
        let mut next = self.doc.cart.clone();
        if !next.replace_from_snapshot(snapshot) {
            return Ok(false);
        }
        self.mirror(actor, next.lines().to_vec())?;
        Ok(true)
    }

    /// Marks the current local quantity of one item as merged into `actor`'s server cart,
    /// so later passes see no pending contribution for it.
    pub fn settle(&mut self, actor: ActorId, item_id: ItemId) -> Result<()> {
        let Some(qty) = self.doc.cart.get(item_id).map(|l| l.qty) else { return Ok(()) };
        self.commit(|doc| {
            let mut baseline = match doc.baseline.take() {
                Some(b) if b.actor == actor => b,
                _ => Baseline { actor, quantities: HashMap::new() },
            };
            baseline.quantities.insert(item_id, qty);
            doc.baseline = Some(baseline);
        })
    }

    /// Guest additions not yet merged into `actor`'s server cart.
    pub fn pending_contributions(&self, actor: ActorId) -> HashMap<ItemId, Quantity> {
        let baseline = self.doc.baseline.as_ref().filter(|b| b.actor == actor);
        let mut out: HashMap<ItemId, Quantity> = HashMap::new();
        for line in self.doc.cart.lines() {
            let base = baseline.and_then(|b| b.quantities.get(&line.item.id)).map_or(0, |q| q.value());
            let extra = line.qty.value() as i64 - base as i64;
            if extra > 0 {
                let q = Quantity::clamped(extra);
                out.entry(line.item.id).and_modify(|e| *e = e.saturating_add(q)).or_insert(q);
            }
        }
        out
    }

    /// Applies a change and persists it; if the write fails the previous state is kept.
    fn commit(&mut self, change: impl FnOnce(&mut LocalCartDocument)) -> Result<()> {
        let prior = self.doc.clone();
        change(&mut self.doc);
        if let Err(e) = self.storage.save(&self.doc) {
            self.doc = prior;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStorage;
    impl LocalStorage for BrokenStorage {
        fn load(&self) -> Result<Option<LocalCartDocument>> { Ok(None) }
        fn save(&self, _: &LocalCartDocument) -> Result<()> { Err(StorefrontError::Storage("disk full".into())) }
    }

    fn item(price: i64) -> ItemSnapshot {
        ItemSnapshot { id: ItemId::new(), title: "Tea".into(), price, currency: "INR".into(), image_url: None }
    }

    #[test]
    fn test_persists_every_mutation() {
        let mut cart = LocalCart::open(MemoryStorage::new());
        let tea = item(250);
        cart.add(tea.clone(), 2).unwrap();
        cart.set_quantity(tea.id, 4).unwrap();
        let reopened = LocalCart::open(MemoryStorage { slot: Mutex::new(cart.storage().slot.lock().unwrap().clone()) });
        assert_eq!(reopened.cart().get(tea.id).unwrap().qty.value(), 4);
    }

    #[test]
    fn test_failed_write_keeps_prior_state() {
        let mut cart = LocalCart::open(BrokenStorage);
        assert!(cart.add(item(100), 1).is_err());
        assert!(cart.cart().is_empty());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        let tea = item(250);
        {
            let mut cart = LocalCart::open(JsonFileStorage::new(&path));
            cart.add(tea.clone(), 3).unwrap();
        }
        let cart = LocalCart::open(JsonFileStorage::new(&path));
        assert_eq!(cart.cart().subtotal(), 750);
    }

    #[test]
    fn test_unreadable_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(LocalCart::open(JsonFileStorage::new(&path)).cart().is_empty());
    }

    #[test]
    fn test_contributions_above_baseline() {
        let actor = ActorId::new();
        let (tea, mug) = (item(250), item(499));
        let mut cart = LocalCart::open(MemoryStorage::new());
        cart.add(tea.clone(), 2).unwrap();
        assert_eq!(cart.pending_contributions(actor).get(&tea.id).map(|q| q.value()), Some(2));

        cart.mirror(actor, vec![CartLine { item: tea.clone(), qty: Quantity::clamped(5) }]).unwrap();
        assert!(cart.pending_contributions(actor).is_empty());

        cart.add(tea.clone(), 1).unwrap();
        cart.add(mug.clone(), 1).unwrap();
        let pending = cart.pending_contributions(actor);
        assert_eq!(pending.get(&tea.id).map(|q| q.value()), Some(1));
        assert_eq!(pending.get(&mug.id).map(|q| q.value()), Some(1));

        // another account sees the whole cart as guest content
        let other = cart.pending_contributions(ActorId::new());
        assert_eq!(other.get(&tea.id).map(|q| q.value()), Some(6));
    }

    #[test]
    fn test_mirror_snapshot_rejects_garbage() {
        let mut cart = LocalCart::open(MemoryStorage::new());
        cart.add(item(100), 1).unwrap();
        assert!(!cart.mirror_snapshot(ActorId::new(), &serde_json::json!("oops")).unwrap());
        assert_eq!(cart.cart().len(), 1);
        assert!(cart.baseline().is_none());
    }
}
