//! Postgres adapter for the catalog, cart and order ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::aggregates::{CatalogItem, Order, OrderLine, PaymentUpdate, ShippingInfo};
use crate::domain::pricing::Totals;
use crate::domain::value_objects::{ActorId, ItemId, Money, OrderId, Quantity};
use crate::ports::{Catalog, CartRepository, ItemPage, ItemQuery, ItemSort, OrderPage, OrderRepository, StoredLine};
use crate::{Result, StorefrontError};

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: Uuid, title: String, slug: String, description: Option<String>, price: i64, currency: String,
    image_url: Option<String>, category: Option<String>, created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow { item_id: Uuid, qty: i32 }

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid, user_id: Option<Uuid>, email: String, name: String, phone: Option<String>,
    address_line1: String, address_line2: Option<String>, city: String, state: String, postal_code: String, country: String,
    subtotal: i64, shipping: i64, total: i64, currency: String,
    status: String, payment_method: String, payment_status: String, payment_ref: Option<String>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow { order_id: Uuid, item_id: Uuid, title: String, price: i64, currency: String, qty: i32, image_url: Option<String> }

const ITEM_COLUMNS: &str = "id, title, slug, description, price, currency, image_url, category, created_at";

// $1 text pattern, $2 category pattern, $3 min price, $4 max price
const ITEM_FILTER: &str = "($1::text IS NULL OR title ILIKE $1 OR description ILIKE $1) \
    AND ($2::text IS NULL OR category ILIKE $2) \
    AND ($3::bigint IS NULL OR price >= $3) \
    AND ($4::bigint IS NULL OR price <= $4)";

const ORDER_COLUMNS: &str = "id, user_id, email, name, phone, address_line1, address_line2, city, state, postal_code, country, \
    subtotal, shipping, total, currency, status, payment_method, payment_status, payment_ref, created_at, updated_at";

impl From<ItemRow> for CatalogItem {
    fn from(r: ItemRow) -> Self {
        CatalogItem {
            id: r.id.into(), title: r.title, slug: r.slug, description: r.description, price: Money::new(r.price, &r.currency),
            image_url: r.image_url, category: r.category, created_at: r.created_at,
        }
    }
}

impl From<OrderLineRow> for OrderLine {
    fn from(r: OrderLineRow) -> Self {
        OrderLine { item_id: r.item_id.into(), title: r.title, price: r.price, currency: r.currency, qty: Quantity::clamped(r.qty as i64), image_url: r.image_url }
    }
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Result<Order> {
        let corrupt = |e: crate::domain::aggregates::OrderError| StorefrontError::Storage(format!("order {}: {e}", self.id));
        Ok(Order {
            id: self.id.into(),
            actor: self.user_id.map(ActorId::from),
            shipping: ShippingInfo {
                name: self.name.clone(), email: self.email.clone(), phone: self.phone.clone(),
                address_line1: self.address_line1.clone(), address_line2: self.address_line2.clone(),
                city: self.city.clone(), state: self.state.clone(), postal_code: self.postal_code.clone(), country: self.country.clone(),
            },
            lines,
            totals: Totals { subtotal: self.subtotal, shipping_fee: self.shipping, total: self.total },
            currency: self.currency.clone(),
            status: self.status.parse().map_err(corrupt)?,
            payment_method: self.payment_method.parse().map_err(corrupt)?,
            payment_status: self.payment_status.parse().map_err(corrupt)?,
            payment_ref: self.payment_ref.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub fn pool(&self) -> &PgPool { &self.pool }

    /// Inserts or updates by slug, the way catalog seeding expects.
    pub async fn upsert_item(&self, item: &CatalogItem) -> Result<ItemId> {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO items (id, title, slug, description, price, currency, image_url, category) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (slug) DO UPDATE SET title = EXCLUDED.title, description = EXCLUDED.description, \
             price = EXCLUDED.price, currency = EXCLUDED.currency, image_url = EXCLUDED.image_url, \
             category = EXCLUDED.category, updated_at = NOW() \
             RETURNING id",
        )
        .bind(item.id.as_uuid())
        .bind(&item.title)
        .bind(&item.slug)
        .bind(&item.description)
        .bind(item.price.amount())
        .bind(item.price.currency())
        .bind(&item.image_url)
        .bind(&item.category)
        .fetch_one(&self.pool)
        .await?;
        Ok(id.into())
    }

    async fn lines_for(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLine>>> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            "SELECT order_id, item_id, title, price, currency, qty, image_url FROM order_lines WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            by_order.entry(row.order_id).or_default().push(row.into());
        }
        Ok(by_order)
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn resolve_items(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, CatalogItem>> {
        let ids: Vec<Uuid> = ids.iter().map(ItemId::as_uuid).collect();
        let rows = sqlx::query_as::<_, ItemRow>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| (ItemId::from(r.id), CatalogItem::from(r))).collect())
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage> {
        let order_by = match query.sort {
            ItemSort::New => "created_at DESC, id DESC",
            ItemSort::PriceAsc => "price ASC, id ASC",
            ItemSort::PriceDesc => "price DESC, id ASC",
        };
        let text = query.text.as_deref().map(|t| format!("%{t}%"));
        let category = query.category.as_deref().map(|c| format!("%{c}%"));

        let list_sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE {ITEM_FILTER} ORDER BY {order_by} LIMIT $5 OFFSET $6");
        let count_sql = format!("SELECT COUNT(*) FROM items WHERE {ITEM_FILTER}");
        let list = sqlx::query_as::<_, ItemRow>(&list_sql)
            .bind(&text)
            .bind(&category)
            .bind(query.min_price)
            .bind(query.max_price)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool);
        let count = sqlx::query_as::<_, (i64,)>(&count_sql)
            .bind(&text)
            .bind(&category)
            .bind(query.min_price)
            .bind(query.max_price)
            .fetch_one(&self.pool);
        let (rows, (total,)) = tokio::try_join!(list, count)?;
        Ok(ItemPage { items: rows.into_iter().map(CatalogItem::from).collect(), total })
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn get_lines(&self, actor: ActorId) -> Result<Vec<StoredLine>> {
        let rows = sqlx::query_as::<_, CartLineRow>("SELECT item_id, qty FROM cart_lines WHERE user_id = $1 ORDER BY created_at, id")
            .bind(actor.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| StoredLine { item_id: r.item_id.into(), qty: Quantity::clamped(r.qty as i64) }).collect())
    }

    async fn get_line(&self, actor: ActorId, item_id: ItemId) -> Result<Option<StoredLine>> {
        let row = sqlx::query_as::<_, CartLineRow>("SELECT item_id, qty FROM cart_lines WHERE user_id = $1 AND item_id = $2")
            .bind(actor.as_uuid())
            .bind(item_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| StoredLine { item_id: r.item_id.into(), qty: Quantity::clamped(r.qty as i64) }))
    }

    async fn upsert_line(&self, actor: ActorId, item_id: ItemId, qty: Quantity) -> Result<()> {
        sqlx::query(
            "INSERT INTO cart_lines (user_id, item_id, qty) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, item_id) DO UPDATE SET qty = EXCLUDED.qty, updated_at = NOW()",
        )
        .bind(actor.as_uuid())
        .bind(item_id.as_uuid())
        .bind(qty.value() as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_line(&self, actor: ActorId, item_id: ItemId) -> Result<bool> {
        let res = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1 AND item_id = $2")
            .bind(actor.as_uuid())
            .bind(item_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn clear_lines(&self, actor: ActorId) -> Result<()> {
        sqlx::query("DELETE FROM cart_lines WHERE user_id = $1").bind(actor.as_uuid()).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn create_order(&self, order: &Order) -> Result<OrderId> {
        let mut tx = self.pool.begin().await?;
        let s = &order.shipping;
        sqlx::query(
            "INSERT INTO orders (id, user_id, email, name, phone, address_line1, address_line2, city, state, postal_code, country, \
             subtotal, shipping, total, currency, status, payment_method, payment_status, payment_ref, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)",
        )
        .bind(order.id.as_uuid()).bind(order.actor.map(|a| a.as_uuid()))
        .bind(&s.email).bind(&s.name).bind(&s.phone).bind(&s.address_line1).bind(&s.address_line2)
        .bind(&s.city).bind(&s.state).bind(&s.postal_code).bind(&s.country)
        .bind(order.totals.subtotal).bind(order.totals.shipping_fee).bind(order.totals.total).bind(&order.currency)
        .bind(order.status.as_str()).bind(order.payment_method.as_str()).bind(order.payment_status.as_str()).bind(&order.payment_ref)
        .bind(order.created_at).bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_lines (order_id, position, item_id, title, price, currency, qty, image_url) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(order.id.as_uuid()).bind(position as i32).bind(line.item_id.as_uuid()).bind(&line.title)
            .bind(line.price).bind(&line.currency).bind(line.qty.value() as i32).bind(&line.image_url)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order.id)
    }

    async fn get_order(&self, id: OrderId, actor: Option<ActorId>) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND (user_id IS NULL OR user_id = $2)"
        ))
        .bind(id.as_uuid())
        .bind(actor.map(|a| a.as_uuid()))
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };
        let mut lines = self.lines_for(&[row.id]).await?;
        let own = lines.remove(&row.id).unwrap_or_default();
        row.into_order(own).map(Some)
    }

    async fn update_order_payment(&self, id: OrderId, update: &PaymentUpdate) -> Result<()> {
        let res = sqlx::query(
            "UPDATE orders SET status = $2, payment_status = $3, payment_method = $4, payment_ref = $5, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(update.status.as_str())
        .bind(update.payment_status.as_str())
        .bind(update.payment_method.as_str())
        .bind(&update.payment_ref)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StorefrontError::NotFound("Order not found".to_string()));
        }
        Ok(())
    }

    async fn list_orders(&self, actor: ActorId, offset: i64, limit: i64) -> Result<OrderPage> {
        let list_sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3");
        let list = sqlx::query_as::<_, OrderRow>(&list_sql).bind(actor.as_uuid()).bind(limit).bind(offset).fetch_all(&self.pool);
        let count = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM orders WHERE user_id = $1").bind(actor.as_uuid()).fetch_one(&self.pool);
        let (rows, (total,)) = tokio::try_join!(list, count)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut lines = if ids.is_empty() { HashMap::new() } else { self.lines_for(&ids).await? };
        let orders = rows
            .into_iter()
            .map(|row| {
                let own = lines.remove(&row.id).unwrap_or_default();
                row.into_order(own)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(OrderPage { orders, total })
    }
}
