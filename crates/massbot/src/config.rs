//! Process configuration.
//!
//! Settings come from environment variables, switches from the command
//! line. [`BotConfig::from_lookup`] takes the variable source as a closure
//! so tests never touch the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use massbot_api::ServerConfig;
use massbot_chain::{Address, RetryPolicy, SubscriptionConfig};
use massbot_indexer::ReconcileConfig;
use massbot_types::TokenId;

use crate::error::BotError;

/// Collection contract on mainnet.
const DEFAULT_MERGE_ADDRESS: &str = "0xc3f8a0F5841aBFf777d3eefA5047e8D413a1C9AB";

/// ENS registry on mainnet.
const DEFAULT_ENS_REGISTRY_ADDRESS: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

/// Token served by `GET /rank` unless overridden.
const DEFAULT_TRACKED_TOKEN_ID: u64 = 26_984;

/// Default capacity of the subscription-to-applicator channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Default `PostgreSQL` pool size.
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Command-line switches.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "massbot", version, about = "Merge collection indexer and rank endpoint")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Skip the bulk reconciliation pass at startup.
    #[arg(long)]
    pub skip: bool,

    /// Serve the rank endpoint without following live events.
    #[arg(long, conflicts_with = "once")]
    pub no_events: bool,

    /// Run the bulk pass and the alpha sync, then exit.
    #[arg(long, conflicts_with = "skip")]
    pub once: bool,

    /// Keep the token mirror in memory instead of `PostgreSQL`.
    #[arg(long)]
    pub memory: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT`; anything but `json` is [`LogFormat::Pretty`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// JSON-RPC endpoint of the ledger.
    pub rpc_url: String,
    /// `PostgreSQL` URL. Required unless running with `--memory`.
    pub database_url: Option<String>,
    /// Collection contract.
    pub merge_address: Address,
    /// ENS registry used for alias lookups.
    pub ens_registry: Address,
    /// Bind address of the rank endpoint.
    pub server: ServerConfig,
    /// Token served by `GET /rank`.
    pub tracked_token: TokenId,
    /// Bulk pass tuning.
    pub reconcile: ReconcileConfig,
    /// Timeout and retry policy for ledger reads.
    pub retry: RetryPolicy,
    /// Log subscription tuning.
    pub subscription: SubscriptionConfig,
    /// First block of the live subscription; head + 1 when unset.
    pub start_block: Option<u64>,
    /// Capacity of the ordered event channel.
    pub event_channel_capacity: usize,
    /// `PostgreSQL` pool size.
    pub db_max_connections: u32,
    /// Webhook for notifications; the log when unset.
    pub notify_webhook_url: Option<String>,
    /// Notification template override.
    pub notify_template: Option<PathBuf>,
}

impl BotConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, BotError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Required variables:
    /// - `RPC_URL` -- JSON-RPC endpoint of the ledger
    ///
    /// Everything else is optional; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BotError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let rpc_url = get("RPC_URL").ok_or_else(|| BotError::Config("RPC_URL is required".to_owned()))?;

        let reconcile = ReconcileConfig::default();
        let retry = RetryPolicy::default();
        let subscription = SubscriptionConfig::default();
        let server = ServerConfig::default();

        let tracked = parse_or(&get, "TRACKED_TOKEN_ID", DEFAULT_TRACKED_TOKEN_ID)?;
        let tracked_token = TokenId::from_ledger(tracked)
            .ok_or_else(|| BotError::Config("TRACKED_TOKEN_ID must be positive".to_owned()))?;

        Ok(Self {
            rpc_url,
            database_url: get("DATABASE_URL"),
            merge_address: parse_or(&get, "MERGE_ADDRESS", parse_address(DEFAULT_MERGE_ADDRESS)?)?,
            ens_registry: parse_or(
                &get,
                "ENS_REGISTRY_ADDRESS",
                parse_address(DEFAULT_ENS_REGISTRY_ADDRESS)?,
            )?,
            server: ServerConfig {
                host: get("HOST").unwrap_or(server.host),
                port: parse_or(&get, "PORT", server.port)?,
            },
            tracked_token,
            reconcile: ReconcileConfig {
                concurrency: parse_or(&get, "BULK_CONCURRENCY", reconcile.concurrency)?,
                batch_size: parse_or(&get, "BULK_BATCH_SIZE", reconcile.batch_size)?,
            },
            retry: RetryPolicy {
                max_attempts: parse_or(&get, "RPC_MAX_ATTEMPTS", retry.max_attempts)?,
                call_timeout: millis_or(&get, "RPC_TIMEOUT_MS", retry.call_timeout)?,
                base_backoff: millis_or(&get, "RPC_BACKOFF_MS", retry.base_backoff)?,
            },
            subscription: SubscriptionConfig {
                poll_interval: millis_or(&get, "POLL_INTERVAL_MS", subscription.poll_interval)?,
                max_block_range: parse_or(&get, "LOG_BLOCK_RANGE", subscription.max_block_range)?,
                confirmations: parse_or(&get, "CONFIRMATIONS", subscription.confirmations)?,
            },
            start_block: get("START_BLOCK")
                .map(|v| parse_value("START_BLOCK", &v))
                .transpose()?,
            event_channel_capacity: parse_or(
                &get,
                "EVENT_CHANNEL_CAPACITY",
                DEFAULT_EVENT_CHANNEL_CAPACITY,
            )?
            .max(1),
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            notify_webhook_url: get("NOTIFY_WEBHOOK_URL"),
            notify_template: get("NOTIFY_TEMPLATE").map(PathBuf::from),
        })
    }

    /// The `PostgreSQL` URL, or an error naming the missing variable.
    pub fn require_database_url(&self) -> Result<&str, BotError> {
        self.database_url.as_deref().ok_or_else(|| {
            BotError::Config("DATABASE_URL is required unless --memory is given".to_owned())
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, BotError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| BotError::Config(format!("invalid {key} {raw:?}: {e}")))
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, BotError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn millis_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, BotError> {
    get(key).map_or(Ok(default), |raw| {
        parse_value::<u64>(key, &raw).map(Duration::from_millis)
    })
}

fn parse_address(raw: &str) -> Result<Address, BotError> {
    parse_value("address", raw)
}
