//! Axum router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use massbot_chain::ChainReader;
use massbot_db::TokenStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the router:
/// - `GET /rank` -- tracked token
/// - `GET /rank/{id}` -- any token
/// - `GET /health` -- liveness
pub fn build_router<R, S>(state: Arc<AppState<R, S>>) -> Router
where
    R: ChainReader + 'static,
    S: TokenStore + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/rank", get(handlers::get_tracked_rank::<R, S>))
        .route("/rank/{id}", get(handlers::get_rank::<R, S>))
        .route("/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
