//! Catalog seed files: a JSON array of items, upserted by slug.

use serde::Deserialize;
use std::path::Path;

use crate::domain::aggregates::CatalogItem;
use crate::domain::pricing::DEFAULT_CURRENCY;
use crate::{Result, StorefrontError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedItem {
    title: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    description: Option<String>,
    price: i64,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

impl SeedItem {
    fn into_item(self, index: usize) -> Result<CatalogItem> {
        if self.title.trim().is_empty() {
            return Err(StorefrontError::validation(format!("[{index}].title"), "must not be empty"));
        }
        if self.price < 0 {
            return Err(StorefrontError::validation(format!("[{index}].price"), "must be a non-negative integer in minor units"));
        }
        let currency = self.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let mut item = CatalogItem::new(self.title.trim(), self.price, &currency).with_slug(self.slug.as_deref().unwrap_or_default());
        item.description = self.description;
        item.category = self.category;
        item.image_url = self.image_url;
        Ok(item)
    }
}

pub fn parse_seed(raw: &str) -> Result<Vec<CatalogItem>> {
    let rows: Vec<SeedItem> =
        serde_json::from_str(raw).map_err(|e| StorefrontError::validation("seed", e.to_string()))?;
    rows.into_iter().enumerate().map(|(i, row)| row.into_item(i)).collect()
}

pub fn read_seed(path: &Path) -> Result<Vec<CatalogItem>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| StorefrontError::Storage(format!("{}: {e}", path.display())))?;
    parse_seed(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_fills_defaults() {
        let items = parse_seed(r#"[
            { "title": "Blue Hoodie", "price": 1999, "category": "Clothing", "imageUrl": "/Images/hoodie.png" },
            { "title": "Monitor", "slug": "Big Monitor", "price": 29999, "currency": "inr" }
        ]"#)
        .unwrap();
        assert_eq!(items[0].slug, "blue-hoodie");
        assert_eq!(items[0].price.currency(), "INR");
        assert_eq!(items[0].image_url.as_deref(), Some("/Images/hoodie.png"));
        assert_eq!(items[1].slug, "big-monitor");
    }

    #[test]
    fn test_parse_seed_rejects_bad_rows() {
        assert!(parse_seed(r#"[{ "title": "Free", "price": -1 }]"#).is_err());
        assert!(parse_seed(r#"[{ "title": " ", "price": 1 }]"#).is_err());
        assert!(parse_seed(r#"{ "title": "x" }"#).is_err());
    }

    #[test]
    fn test_bundled_demo_catalog_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/catalog.json");
        assert_eq!(read_seed(&path).unwrap().len(), 4);
    }
}
