//! MarketSync Storage Layer
//!
//! Durable key-value storage for the offline mutation queue, backed by
//! SQLite through sqlx.

pub mod connection;
pub mod error;
pub mod kv_store;
pub mod migrations;

pub use connection::{connect, connect_in_memory, DatabaseConfig, DbPool};
pub use error::{StorageError, StorageResult};
pub use kv_store::SqliteKvStore;
pub use migrations::{applied_version, current_version, optimize, run_migrations, verify_integrity};
