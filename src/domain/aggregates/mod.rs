//! Aggregates module
pub mod cart;
pub mod item;
pub mod order;

pub use cart::{Cart, CartLine, ItemSnapshot};
pub use item::CatalogItem;
pub use order::{
    IntentStatus, Order, OrderError, OrderLine, OrderStatus, PaymentMethod, PaymentOutcome, PaymentStatus,
    PaymentUpdate, ShippingInfo,
};
