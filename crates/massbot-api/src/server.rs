//! HTTP server lifecycle.
//!
//! [`start_server`] binds the configured address and serves until the
//! shutdown flag flips to `true`; in-flight requests are allowed to finish.

use std::sync::Arc;

use massbot_chain::ChainReader;
use massbot_db::TokenStore;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::router::build_router;
use crate::state::AppState;

/// Default port.
const DEFAULT_PORT: u16 = 3000;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name or IP literal to bind to (e.g. `0.0.0.0`, `::1`,
    /// `localhost`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: DEFAULT_PORT,
        }
    }
}

/// Bind to `config` and serve until `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server<R, S>(
    config: &ServerConfig,
    state: Arc<AppState<R, S>>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError>
where
    R: ChainReader + 'static,
    S: TokenStore + 'static,
{
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {}:{}: {e}", config.host, config.port)))?;

    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` fires.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] on a fatal I/O error.
pub async fn serve<R, S>(
    listener: TcpListener,
    state: Arc<AppState<R, S>>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError>
where
    R: ChainReader + 'static,
    S: TokenStore + 'static,
{
    let router = build_router(state);
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "rank endpoint listening");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("rank endpoint stopped");
    Ok(())
}

/// Resolve once `shutdown` holds `true` or its sender is dropped.
pub async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        debug!("shutdown sender dropped");
    }
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
