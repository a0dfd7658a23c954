//! Token state store for the massbot indexer.
//!
//! The store maps each token identifier to its last-known
//! [`TokenRecord`](massbot_types::TokenRecord). Writers are the bulk
//! reconciler and the event applicator, which may run at the same time; all
//! writes are idempotent upserts keyed by identifier.
//!
//! # Backends
//!
//! ```text
//! TokenStore (trait)
//!     |-- PgTokenStore  (PostgreSQL via sqlx, durable)
//!     +-- MemoryStore   (BTreeMap behind an RwLock, tests and --memory runs)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- the [`TokenStore`] contract and [`CountFilter`]
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`token_store`] -- the `PostgreSQL` implementation
//! - [`memory`] -- the in-memory implementation
//! - [`error`] -- Shared error types

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod token_store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use store::{AlphaUpdate, CountFilter, TokenStore};
pub use token_store::{PgTokenStore, TokenRow};
