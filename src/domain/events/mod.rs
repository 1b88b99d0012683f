//! Domain events
use serde::Serialize;

use crate::domain::aggregates::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::domain::value_objects::{ActorId, OrderId};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: OrderId, actor: Option<ActorId>, total: i64, currency: String, payment_method: PaymentMethod },
    Payment { order_id: OrderId, status: OrderStatus, payment_status: PaymentStatus, payment_method: PaymentMethod },
    Cancelled { order_id: OrderId },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "storefront.order.placed",
            Self::Order(OrderEvent::Payment { .. }) => "storefront.order.payment",
            Self::Order(OrderEvent::Cancelled { .. }) => "storefront.order.cancelled",
        }
    }
}
