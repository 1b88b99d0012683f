//! Persistence adapters.
pub mod memory;
pub mod postgres;
pub mod seed;

pub use memory::InMemoryStore;
pub use postgres::PgStore;
