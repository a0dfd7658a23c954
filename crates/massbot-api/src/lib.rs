//! Read endpoint for the massbot token indexer.
//!
//! Serves the rank of a token by mass, computed from the token mirror, plus
//! the current owner looked up on the ledger.
//!
//! # Modules
//!
//! - [`router`] -- Axum router construction
//! - [`handlers`] -- endpoint handlers
//! - [`state`] -- shared application state
//! - [`server`] -- server lifecycle and graceful shutdown
//! - [`error`] -- error types and HTTP mapping

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve, shutdown_signal, start_server};
pub use state::AppState;
