//! Reset-token persistence.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryResetTokenStore;
pub use postgres::PostgresResetTokenStore;
pub use r#trait::{ResetTokenStore, StoreError};
