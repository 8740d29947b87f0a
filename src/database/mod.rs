pub mod connection;
pub mod prize_store;

pub use connection::{DbPool, create_pool, run_migrations};
pub use prize_store::DatabaseStore;
