//! Massbot binary.
//!
//! Mirrors the collection's tokens into a store, keeps the mirror current
//! from live merge events, posts a notification per merge, and serves the
//! rank endpoint.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Parse command-line switches and load configuration from the environment
//! 3. Open the store (`PostgreSQL` with migrations, or in memory)
//! 4. Build the retrying ledger reader and capture the head block
//! 5. Run the bulk reconciliation pass unless `--skip`, then sync the alpha
//! 6. Start the log subscription and the event applicator unless `--no-events`
//! 7. Serve the rank endpoint until SIGINT or SIGTERM
//! 8. Stop the background tasks and drain queued events

mod config;
mod error;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use massbot_api::{AppState, start_server};
use massbot_chain::{
    ChainError, ChainReader, JsonRpcClient, LogSubscription, MergeContract, RetryingReader,
};
use massbot_db::{MemoryStore, PostgresConfig, PostgresPool, TokenStore};
use massbot_indexer::{
    BulkReconciler, ConfiguredSink, EventApplicator, LogSink, NotificationRenderer, WebhookSink,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{BotConfig, Cli, LogFormat};
use crate::error::BotError;

/// Timeout for a single webhook delivery.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the store cannot be
/// opened, or the rank endpoint fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    init_tracing(LogFormat::from_lookup(|key| std::env::var(key).ok()));
    info!("massbot starting");

    let cli = Cli::parse();
    if let Err(e) = start(&cli).await {
        error!(error = %e, "massbot stopped with an error");
        return Err(e.into());
    }

    info!("massbot shutdown complete");
    Ok(())
}

async fn start(cli: &Cli) -> Result<(), BotError> {
    // 2. Load configuration.
    let config = BotConfig::from_env()?;
    info!(
        rpc_url = %config.rpc_url,
        merge_address = %config.merge_address,
        tracked_token = %config.tracked_token,
        skip = cli.skip,
        no_events = cli.no_events,
        once = cli.once,
        memory = cli.memory,
        "Configuration loaded"
    );

    // 3. Open the store.
    if cli.memory {
        warn!("using in-memory store, nothing survives a restart");
        return run(cli, &config, Arc::new(MemoryStore::new())).await;
    }

    let pg_config = PostgresConfig::new(config.require_database_url()?)
        .with_max_connections(config.db_max_connections);
    let pool = PostgresPool::open(&pg_config).await?;

    let result = run(cli, &config, Arc::new(pool.token_store())).await;
    pool.close().await;
    result
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Everything after the store is open.
#[allow(clippy::too_many_lines)]
async fn run<S>(cli: &Cli, config: &BotConfig, store: Arc<S>) -> Result<(), BotError>
where
    S: TokenStore + 'static,
{
    // 4. Ledger reader and head block.
    let rpc = JsonRpcClient::new(&config.rpc_url, config.retry.call_timeout)?;
    let contract = MergeContract::new(rpc.clone(), config.merge_address, config.ens_registry);
    let reader = Arc::new(RetryingReader::new(contract, config.retry));

    let head = config
        .retry
        .run("block_number", || async {
            rpc.block_number().await.map_err(ChainError::from)
        })
        .await?;
    let start_block = config.start_block.unwrap_or_else(|| head.saturating_add(1));
    info!(head, start_block, "Ledger reachable");

    // 5. Bulk reconciliation and alpha sync.
    let reconciler = BulkReconciler::new(Arc::clone(&reader), Arc::clone(&store), config.reconcile);
    if cli.skip {
        info!("bulk reconciliation skipped");
    } else {
        let universe = reader.universe_size().await?;
        let report = reconciler.run(universe).await;
        if report.unavailable > 0 || report.unwritten > 0 || report.failed_lanes > 0 {
            warn!(
                unavailable = report.unavailable,
                unwritten = report.unwritten,
                failed_lanes = report.failed_lanes,
                "bulk pass left stale records"
            );
        }
    }
    if let Err(e) = reconciler.sync_alpha().await {
        warn!(error = %e, "alpha sync failed");
    }

    if cli.once {
        info!("single pass complete");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals = tokio::spawn({
        let shutdown_tx = shutdown_tx.clone();
        async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    // 6. Live events.
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    if cli.no_events {
        info!("live events disabled");
    } else {
        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let subscription = LogSubscription::new(
            rpc.clone(),
            config.merge_address,
            config.subscription,
            start_block,
        );
        tasks.push(tokio::spawn(subscription.run(tx, shutdown_rx.clone())));

        let renderer = match &config.notify_template {
            Some(path) => NotificationRenderer::from_file(path)?,
            None => NotificationRenderer::new()?,
        };
        let sink = match &config.notify_webhook_url {
            Some(url) => ConfiguredSink::Webhook(WebhookSink::new(url, WEBHOOK_TIMEOUT)?),
            None => ConfiguredSink::Log(LogSink),
        };
        let applicator = EventApplicator::new(Arc::clone(&reader), Arc::clone(&store), renderer, sink);
        tasks.push(tokio::spawn(async move {
            let applied = applicator.run(rx).await;
            info!(applied, "event applicator drained");
        }));
    }

    // 7. Rank endpoint.
    let state = Arc::new(AppState::new(reader, store, config.tracked_token));
    let served = start_server(&config.server, state, shutdown_rx).await;

    // 8. Stop background tasks.
    let _ = shutdown_tx.send(true);
    signals.abort();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }

    served.map_err(BotError::from)
}

/// Resolve on SIGINT, or SIGTERM on Unix.
async fn wait_for_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}
