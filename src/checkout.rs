//! Checkout / Order Workflow
//!
//! Turns a cart into a priced order snapshot and drives payment to
//! completion. Unit prices always come from the catalog. Provider failures
//! never roll back an order: it stays `pending` and unpaid for a later retry.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::domain::aggregates::{
    IntentStatus, Order, OrderLine, OrderStatus, PaymentMethod, PaymentOutcome, PaymentStatus, ShippingInfo,
};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::{ShippingPolicy, DEFAULT_CURRENCY};
use crate::domain::value_objects::{ActorId, ItemId, Money, OrderId, Quantity};
use crate::notify::{EventPublisher, NullPublisher};
use crate::payments::{IntentProvider, PaymentIntent, ProviderOrder, ProviderOrderGateway};
use crate::ports::{CartRepository, Catalog, OrderRepository};
use crate::{Result, StorefrontError};

pub const MAX_PAGE_SIZE: u32 = 50;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedLine {
    pub item_id: ItemId,
    #[serde(default = "one")]
    pub qty: i64,
}

fn one() -> i64 { 1 }

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    pub shipping: ShippingInfo,
    /// When absent or empty, the actor's server cart is used.
    #[serde(default)]
    pub lines: Option<Vec<RequestedLine>>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub id: OrderId,
    pub amount: i64,
    pub currency: String,
    pub cart_cleared: bool,
    pub subtotal: i64,
    pub shipping: i64,
    pub total: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCheckout {
    pub order_id: OrderId,
    pub provider_order: ProviderOrder,
    pub key_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    Accepted,
    Rejected(&'static str),
}

#[derive(Clone, Debug)]
pub struct OrderHistory {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub orders: Vec<Order>,
}

#[derive(Clone)]
pub struct CheckoutService {
    catalog: Arc<dyn Catalog>,
    carts: Arc<dyn CartRepository>,
    orders: Arc<dyn OrderRepository>,
    intents: Option<Arc<dyn IntentProvider>>,
    gateway: Option<Arc<dyn ProviderOrderGateway>>,
    events: Arc<dyn EventPublisher>,
    shipping: ShippingPolicy,
    currency: String,
}

impl CheckoutService {
    pub fn new(catalog: Arc<dyn Catalog>, carts: Arc<dyn CartRepository>, orders: Arc<dyn OrderRepository>) -> Self {
        Self {
            catalog,
            carts,
            orders,
            intents: None,
            gateway: None,
            events: Arc::new(NullPublisher),
            shipping: ShippingPolicy::default(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    pub fn with_intents(mut self, provider: Arc<dyn IntentProvider>) -> Self { self.intents = Some(provider); self }
    pub fn with_gateway(mut self, gateway: Arc<dyn ProviderOrderGateway>) -> Self { self.gateway = Some(gateway); self }
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self { self.events = events; self }
    pub fn with_shipping(mut self, policy: ShippingPolicy) -> Self { self.shipping = policy; self }
    pub fn with_currency(mut self, currency: &str) -> Self { self.currency = currency.to_uppercase(); self }

    pub fn currency(&self) -> &str { &self.currency }

    /// Creates the order and its frozen lines, then clears the actor's server cart.
    ///
    /// The cart is cleared for every payment method: creating the order commits the cart.
    pub async fn place_order(&self, actor: Option<ActorId>, req: PlaceOrder) -> Result<PlacedOrder> {
        req.shipping.validate()?;

        let requested = match req.lines.filter(|l| !l.is_empty()) {
            Some(lines) => coalesce(lines)?,
            None => match actor {
                Some(actor) => self.carts.get_lines(actor).await?.into_iter().map(|l| (l.item_id, l.qty)).collect(),
                None => Vec::new(),
            },
        };
        if requested.is_empty() {
            return Err(StorefrontError::EmptyCart);
        }

        let ids: Vec<ItemId> = requested.iter().map(|(id, _)| *id).collect();
        let items = self.catalog.resolve_items(&ids).await?;
        let mut lines = Vec::with_capacity(requested.len());
        for (item_id, qty) in &requested {
            let item = items
                .get(item_id)
                .ok_or_else(|| StorefrontError::NotFound(format!("Item not found: {item_id}")))?;
            if item.price.currency() != self.currency {
                return Err(StorefrontError::validation(
                    "lines",
                    format!("{} is priced in {}, store currency is {}", item.id, item.price.currency(), self.currency),
                ));
            }
            lines.push(OrderLine {
                item_id: item.id,
                title: item.title.clone(),
                price: item.price.amount(),
                currency: item.price.currency().to_string(),
                qty: *qty,
                image_url: item.image_url.clone(),
            });
        }

        let line_totals: Vec<Money> = lines.iter().map(OrderLine::line_total).collect();
        let totals = self
            .shipping
            .price(&self.currency, &line_totals)
            .map_err(|e| StorefrontError::validation("lines", e.to_string()))?;

        let order = Order::place(actor, req.shipping, lines, totals, &self.currency, req.payment_method);
        let id = self.orders.create_order(&order).await?;

        let cart_cleared = match actor {
            Some(actor) => match self.carts.clear_lines(actor).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(order_id = %id, %actor, error = %e, "Order placed but cart was not cleared");
                    false
                }
            },
            None => false,
        };

        tracing::info!(order_id = %id, total = totals.total, method = %order.payment_method(), "Order placed");
        self.events
            .publish(DomainEvent::Order(OrderEvent::Placed {
                order_id: id,
                actor,
                total: totals.total,
                currency: self.currency.clone(),
                payment_method: order.payment_method(),
            }))
            .await;

        Ok(PlacedOrder {
            id,
            amount: totals.total,
            currency: self.currency.clone(),
            cart_cleared,
            subtotal: totals.subtotal,
            shipping: totals.shipping_fee,
            total: totals.total,
        })
    }

    /// Creates a card intent for the order and binds it as the payment reference.
    pub async fn start_card_payment(&self, actor: Option<ActorId>, order_id: OrderId) -> Result<PaymentIntent> {
        let intents = self.intents.as_ref().ok_or(StorefrontError::ProviderNotConfigured("Stripe"))?;
        let mut order = self.load(order_id, actor).await?;
        ensure_open(&order)?;
        let intent = intents.create_intent(order.id(), order.totals().total, order.currency()).await?;
        order.begin_payment(PaymentMethod::Card, intent.id.clone())?;
        self.orders.update_order_payment(order.id(), &order.payment_update()).await?;
        Ok(intent)
    }

    /// Records an intent result. The provider's own view of the intent is what counts;
    /// `reported` is what the buyer's client claimed.
    pub async fn record_payment_result(
        &self,
        actor: Option<ActorId>,
        order_id: OrderId,
        intent_id: &str,
        reported: &str,
    ) -> Result<PaymentOutcome> {
        let intents = self.intents.as_ref().ok_or(StorefrontError::ProviderNotConfigured("Stripe"))?;
        let mut order = self.load(order_id, actor).await?;
        let status = intents.retrieve_status(intent_id).await?;
        if status != IntentStatus::parse(reported) {
            tracing::warn!(%order_id, intent_id, reported, actual = ?status, "Client-reported intent status differs from provider");
        }

        let before = order.payment_update();
        let outcome = order.apply_intent_status(intent_id, &status)?;
        if order.payment_update() != before {
            self.orders.update_order_payment(order.id(), &order.payment_update()).await?;
            self.publish_payment(&order).await;
        }
        tracing::info!(%order_id, ?outcome, "Card payment result recorded");
        Ok(outcome)
    }

    /// Creates the provider-side order for the total and binds its id as the payment reference.
    pub async fn create_provider_order(&self, actor: Option<ActorId>, order_id: OrderId) -> Result<ProviderCheckout> {
        let gateway = self.gateway.as_ref().ok_or(StorefrontError::ProviderNotConfigured("Razorpay"))?;
        let mut order = self.load(order_id, actor).await?;
        ensure_open(&order)?;
        let provider_order = gateway.create_provider_order(order.id(), order.totals().total, order.currency()).await?;
        order.begin_payment(PaymentMethod::Razorpay, provider_order.id.clone())?;
        self.orders.update_order_payment(order.id(), &order.payment_update()).await?;
        Ok(ProviderCheckout { order_id: order.id(), provider_order, key_id: gateway.key_id().to_string() })
    }

    /// Marks the order paid only if the signature verifies and the provider order is the one
    /// bound to this order. Re-verifying an already paid order with the same payment id is accepted.
    pub async fn verify_and_confirm(
        &self,
        actor: Option<ActorId>,
        order_id: OrderId,
        provider_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Verification> {
        let gateway = self.gateway.as_ref().ok_or(StorefrontError::ProviderNotConfigured("Razorpay"))?;
        let mut order = self.load(order_id, actor).await?;

        if !gateway.verify_signature(provider_order_id, payment_id, signature) {
            tracing::warn!(%order_id, "Rejected payment with invalid signature");
            return Ok(Verification::Rejected("Invalid payment signature"));
        }
        if order.payment_status() != PaymentStatus::Paid && order.payment_ref() != Some(provider_order_id) {
            tracing::warn!(%order_id, provider_order_id, "Provider order does not belong to this order");
            return Ok(Verification::Rejected("Provider order does not match"));
        }

        if order.confirm_paid(PaymentMethod::Razorpay, payment_id)? {
            self.orders.update_order_payment(order.id(), &order.payment_update()).await?;
            self.publish_payment(&order).await;
            tracing::info!(%order_id, "Order paid");
        }
        Ok(Verification::Accepted)
    }

    /// Only the owning actor may cancel, and only while the order is pending and unpaid.
    pub async fn cancel_order(&self, actor: ActorId, order_id: OrderId) -> Result<Order> {
        let mut order = self.load(order_id, Some(actor)).await?;
        if order.actor() != Some(actor) {
            return Err(StorefrontError::NotFound("Order not found".to_string()));
        }
        order.cancel()?;
        self.orders.update_order_payment(order.id(), &order.payment_update()).await?;
        self.events.publish(DomainEvent::Order(OrderEvent::Cancelled { order_id })).await;
        tracing::info!(%order_id, "Order cancelled");
        Ok(order)
    }

    /// Newest first. `page` starts at 1; `limit` is clamped to `1..=50`.
    pub async fn order_history(&self, actor: ActorId, page: u32, limit: u32) -> Result<OrderHistory> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let offset = (page as i64 - 1) * limit as i64;
        let found = self.orders.list_orders(actor, offset, limit as i64).await?;
        Ok(OrderHistory { page, limit, total: found.total, orders: found.orders })
    }

    async fn load(&self, order_id: OrderId, actor: Option<ActorId>) -> Result<Order> {
        self.orders
            .get_order(order_id, actor)
            .await?
            .ok_or_else(|| StorefrontError::NotFound("Order not found".to_string()))
    }

    async fn publish_payment(&self, order: &Order) {
        self.events
            .publish(DomainEvent::Order(OrderEvent::Payment {
                order_id: order.id(),
                status: order.status(),
                payment_status: order.payment_status(),
                payment_method: order.payment_method(),
            }))
            .await;
    }
}

fn ensure_open(order: &Order) -> Result<()> {
    if order.payment_status() == PaymentStatus::Paid {
        return Err(StorefrontError::Conflict("Order is already paid".to_string()));
    }
    if order.status() != OrderStatus::Pending {
        return Err(StorefrontError::Conflict(format!("Order is {}", order.status())));
    }
    Ok(())
}

/// Validates quantities and folds repeated items into one line, keeping first-seen order.
fn coalesce(lines: Vec<RequestedLine>) -> Result<Vec<(ItemId, Quantity)>> {
    let mut out: Vec<(ItemId, Quantity)> = Vec::with_capacity(lines.len());
    for line in lines {
        let qty = Quantity::try_new(line.qty).ok_or(StorefrontError::InvalidQuantity(line.qty))?;
        match out.iter_mut().find(|(id, _)| *id == line.item_id) {
            Some((_, existing)) => *existing = existing.saturating_add(qty),
            None => out.push((line.item_id, qty)),
        }
    }
    Ok(out)
}
