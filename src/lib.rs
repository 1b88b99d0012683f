//! Storefront commerce core
//!
//! Cart reconciliation, checkout pricing and payment confirmation for a
//! single-currency storefront.
//!
//! ## Features
//! - Guest (local) and member (server-persisted) carts behind one interface
//! - Additive merge of a guest cart into the member cart at login
//! - Order snapshots priced in integer minor units with a free-shipping threshold
//! - Cash on delivery, intent-based card payments and signature-verified provider orders
//! - Order history

use thiserror::Error;

pub mod cart;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod http;
pub mod notify;
pub mod payments;
pub mod ports;
pub mod reconcile;
pub mod session;
pub mod store;

pub use cart::{CartBackend, LocalCart, ServerCart};
pub use checkout::CheckoutService;
pub use config::Config;
pub use domain::value_objects::{ActorId, ItemId, OrderId, Quantity};
pub use reconcile::Reconciler;
pub use session::{AuthState, Session};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("{field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("{0} not configured")]
    ProviderNotConfigured(&'static str),

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl StorefrontError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), reason: reason.into() }
    }

    /// Storage and transport failures may succeed on retry; everything else is a rejection.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Transport(_))
    }
}

impl From<sqlx::Error> for StorefrontError {
    fn from(e: sqlx::Error) -> Self { Self::Storage(e.to_string()) }
}

impl From<reqwest::Error> for StorefrontError {
    fn from(e: reqwest::Error) -> Self { Self::Transport(e.to_string()) }
}

impl From<domain::aggregates::OrderError> for StorefrontError {
    fn from(e: domain::aggregates::OrderError) -> Self { Self::Conflict(e.to_string()) }
}

impl From<validator::ValidationErrors> for StorefrontError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        match fields.first() {
            Some((field, errs)) => {
                let reason = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .or_else(|| errs.first().map(|e| e.code.to_string()))
                    .unwrap_or_else(|| "invalid".to_string());
                Self::validation(field.to_string(), reason)
            }
            None => Self::validation("input", "invalid"),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
