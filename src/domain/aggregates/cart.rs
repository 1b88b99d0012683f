//! Cart Aggregate
//!
//! One line per item, quantities clamped to `1..=99`. The same aggregate backs
//! the guest cart and the local mirror of a member's server cart.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::pricing::DEFAULT_CURRENCY;
use crate::domain::value_objects::{ItemId, Quantity};

/// Item display data captured when the line was added (or reported by the server).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub id: ItemId,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub item: ItemSnapshot,
    pub qty: Quantity,
}

impl CartLine {
    pub fn item_id(&self) -> ItemId { self.item.id }
    pub fn line_total(&self) -> i64 { self.item.price.saturating_mul(self.qty.value() as i64) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn len(&self) -> usize { self.lines.len() }
    pub fn get(&self, item_id: ItemId) -> Option<&CartLine> { self.lines.iter().find(|l| l.item.id == item_id) }

    /// Adds `quantity` (clamped) to the item's line, creating it if absent.
    pub fn add(&mut self, item: ItemSnapshot, quantity: i64) {
        let q = Quantity::clamped(quantity);
        if let Some(existing) = self.lines.iter_mut().find(|l| l.item.id == item.id) {
            existing.qty = existing.qty.saturating_add(q);
        } else {
            self.lines.push(CartLine { item, qty: q });
        }
    }

    /// Replaces the line's quantity; zero or less removes the line. Unknown items are ignored.
    pub fn set_quantity(&mut self, item_id: ItemId, quantity: i64) {
        if quantity <= 0 {
            self.remove(item_id);
            return;
        }
        if let Some(line) = self.lines.iter_mut().find(|l| l.item.id == item_id) {
            line.qty = Quantity::clamped(quantity);
        }
    }

    /// Returns whether a line was removed; absence is not an error.
    pub fn remove(&mut self, item_id: ItemId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.item.id != item_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) { self.lines.clear(); }

    /// Wholesale replacement from typed lines. Duplicate items are summed and clamped.
    pub fn replace_lines(&mut self, lines: Vec<CartLine>) {
        let mut next = Cart::new();
        for line in lines {
            next.add(line.item, line.qty.value() as i64);
        }
        *self = next;
    }

    /// Wholesale replacement from an untrusted server payload.
    ///
    /// Anything that is not an array, or an array in which no row could be read,
    /// leaves the cart untouched and returns `false`. An empty array empties the cart.
    pub fn replace_from_snapshot(&mut self, snapshot: &Value) -> bool {
        let Some(rows) = snapshot.as_array() else { return false };
        let mapped: Vec<CartLine> = rows.iter().filter_map(parse_snapshot_row).collect();
        if mapped.is_empty() && !rows.is_empty() {
            return false;
        }
        self.replace_lines(mapped);
        true
    }

    /// Sum of `price * qty` in minor units; an empty cart is 0.
    pub fn subtotal(&self) -> i64 {
        self.lines.iter().fold(0i64, |acc, l| acc.saturating_add(l.line_total()))
    }

    pub fn quantities(&self) -> HashMap<ItemId, Quantity> {
        self.lines.iter().map(|l| (l.item.id, l.qty)).collect()
    }
}

/// Reads either the local shape `{ item: {...}, qty }` or the server shape `{ itemId, title, price, qty }`.
fn parse_snapshot_row(row: &Value) -> Option<CartLine> {
    let qty = Quantity::clamped(row.get("qty").map(lenient_number).unwrap_or(1));
    if let Some(item) = row.get("item").filter(|i| i.get("id").is_some()) {
        let item: ItemSnapshot = serde_json::from_value(item.clone()).ok()?;
        return Some(CartLine { item, qty });
    }
    let id = row.get("itemId")?.as_str()?.parse().ok()?;
    Some(CartLine {
        item: ItemSnapshot {
            id,
            title: row.get("title").and_then(Value::as_str).map_or_else(default_title, str::to_string),
            price: row.get("price").map(lenient_number).unwrap_or(0).max(0),
            currency: row.get("currency").and_then(Value::as_str).map_or_else(default_currency, str::to_string),
            image_url: row.get("imageUrl").and_then(Value::as_str).map(str::to_string),
        },
        qty,
    })
}

/// Numbers are truncated, numeric strings parsed, anything else reads as 0.
fn lenient_number(v: &Value) -> i64 {
    let n = match v {
        Value::Number(n) => n.as_i64().map(|i| i as f64).or_else(|| n.as_f64()),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() => n.trunc() as i64,
        _ => 0,
    }
}

fn lenient_price<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(lenient_number(&v).max(0))
}

fn default_title() -> String { "Item".to_string() }
fn default_currency() -> String { DEFAULT_CURRENCY.to_string() }
