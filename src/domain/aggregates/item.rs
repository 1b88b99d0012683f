//! Catalog item as seen by the storefront. Items are maintained elsewhere;
//! this crate only reads them (and seeds them for local runs).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::cart::ItemSnapshot;
use crate::domain::value_objects::{ItemId, Money};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: ItemId,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: Money,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CatalogItem {
    pub fn new(title: impl Into<String>, price: i64, currency: &str) -> Self {
        let title = title.into();
        Self {
            id: ItemId::new(),
            slug: slugify(&title),
            title,
            description: None,
            price: Money::new(price, currency),
            image_url: None,
            category: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self { self.image_url = Some(url.into()); self }
    pub fn with_category(mut self, category: impl Into<String>) -> Self { self.category = Some(category.into()); self }
    pub fn with_description(mut self, text: impl Into<String>) -> Self { self.description = Some(text.into()); self }

    /// An empty slug falls back to the slugified title.
    pub fn with_slug(mut self, slug: &str) -> Self {
        let slug = slugify(slug);
        if !slug.is_empty() {
            self.slug = slug;
        }
        self
    }

    /// Display data frozen into a cart line.
    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            id: self.id,
            title: self.title.clone(),
            price: self.price.amount(),
            currency: self.price.currency().to_string(),
            image_url: self.image_url.clone(),
        }
    }
}

/// Lowercase, word characters and single hyphens only.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.trim().to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
