//! Shared application state for the read endpoint.

use std::sync::Arc;

use massbot_types::TokenId;

/// State handed to every handler.
///
/// The reader and store are the same instances the indexer uses.
#[derive(Debug)]
pub struct AppState<R, S> {
    /// Ledger reader, for owner lookups.
    pub reader: Arc<R>,
    /// Token mirror.
    pub store: Arc<S>,
    /// Token served by `GET /rank`.
    pub tracked: TokenId,
}

impl<R, S> AppState<R, S> {
    /// Create the state.
    pub const fn new(reader: Arc<R>, store: Arc<S>, tracked: TokenId) -> Self {
        Self {
            reader,
            store,
            tracked,
        }
    }
}
