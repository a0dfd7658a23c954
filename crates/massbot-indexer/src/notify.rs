//! Merge notifications.
//!
//! The applicator builds a [`MergeNotification`] after each completed
//! merge, renders it to text with a `minijinja` template and hands the
//! result to a [`NotificationSink`]. Delivery is best effort: a failure is
//! logged by the caller and never touches the store.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use massbot_types::{Mass, OwnerInfo, TokenRecord};
use minijinja::Environment;
use serde::Serialize;

use crate::error::IndexerError;

/// Template used when no override is configured.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/merge.j2");

/// Name the template is registered under.
const TEMPLATE_NAME: &str = "merge";

/// Everything known about a completed merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeNotification {
    /// Block that emitted the merge.
    pub block_number: u64,
    /// The loser as it was before being retired.
    pub loser: TokenRecord,
    /// The winner as it was before the merge.
    pub winner_before: TokenRecord,
    /// The winner after the merge.
    pub winner_after: TokenRecord,
    /// Existing tokens left after the merge.
    pub remaining: u64,
    /// Whether the loser was of a higher tier than the winner.
    pub tier_inversion: bool,
    /// Current owner of the winner, when it could be resolved.
    pub owner: Option<OwnerInfo>,
}

impl MergeNotification {
    /// Build a notification from the prior loser and winner states.
    pub fn new(block_number: u64, loser: TokenRecord, winner_before: TokenRecord, combined: Mass) -> Self {
        Self {
            block_number,
            loser,
            winner_before,
            winner_after: winner_before.with_mass(combined),
            remaining: 0,
            tier_inversion: loser.tier > winner_before.tier,
            owner: None,
        }
    }

    /// Mass the winner gained.
    pub const fn gained(&self) -> u64 {
        self.winner_after.mass.get().saturating_sub(self.winner_before.mass.get())
    }
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Notification {
    /// Message text.
    pub text: String,
    /// Optional binary attachment.
    pub image: Option<Vec<u8>>,
}

#[derive(Serialize)]
struct LoserContext {
    id: u64,
    tier: u32,
    tier_name: String,
    mass: u64,
}

#[derive(Serialize)]
struct WinnerContext {
    id: u64,
    tier: u32,
    tier_name: String,
    mass_before: u64,
    mass_after: u64,
}

#[derive(Serialize)]
struct TemplateContext {
    block_number: u64,
    loser: LoserContext,
    winner: WinnerContext,
    gained: u64,
    remaining: u64,
    tier_inversion: bool,
    owner: Option<String>,
}

impl From<&MergeNotification> for TemplateContext {
    fn from(n: &MergeNotification) -> Self {
        Self {
            block_number: n.block_number,
            loser: LoserContext {
                id: n.loser.id.get(),
                tier: n.loser.tier.get(),
                tier_name: n.loser.tier.name(),
                mass: n.loser.mass.get(),
            },
            winner: WinnerContext {
                id: n.winner_before.id.get(),
                tier: n.winner_before.tier.get(),
                tier_name: n.winner_before.tier.name(),
                mass_before: n.winner_before.mass.get(),
                mass_after: n.winner_after.mass.get(),
            },
            gained: n.gained(),
            remaining: n.remaining,
            tier_inversion: n.tier_inversion,
            owner: n.owner.as_ref().map(|o| o.display_name().to_owned()),
        }
    }
}

/// Renders [`MergeNotification`]s to text.
#[derive(Debug)]
pub struct NotificationRenderer {
    env: Environment<'static>,
}

impl NotificationRenderer {
    /// A renderer using [`DEFAULT_TEMPLATE`].
    pub fn new() -> Result<Self, IndexerError> {
        Self::from_source(DEFAULT_TEMPLATE.to_owned())
    }

    /// A renderer using the template stored at `path`.
    pub fn from_file(path: &Path) -> Result<Self, IndexerError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            IndexerError::Template(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_source(source)
    }

    /// A renderer using the given template source.
    pub fn from_source(source: String) -> Result<Self, IndexerError> {
        let mut env = Environment::new();
        env.add_template_owned(TEMPLATE_NAME, source)
            .map_err(|e| IndexerError::Template(format!("failed to add merge template: {e}")))?;
        Ok(Self { env })
    }

    /// Render the notification text.
    pub fn render(&self, notification: &MergeNotification) -> Result<String, IndexerError> {
        self.env
            .get_template(TEMPLATE_NAME)
            .map_err(|e| IndexerError::Template(format!("missing merge template: {e}")))?
            .render(TemplateContext::from(notification))
            .map_err(|e| IndexerError::Template(format!("merge render failed: {e}")))
    }
}

/// Where rendered notifications go.
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    fn deliver(&self, notification: &Notification) -> impl Future<Output = Result<(), IndexerError>> + Send;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), IndexerError> {
        tracing::info!(
            text = %notification.text,
            image_bytes = notification.image.as_ref().map_or(0, Vec::len),
            "merge notification"
        );
        Ok(())
    }
}

/// POSTs notifications to an HTTP endpoint.
///
/// The text goes out as `{"text": ...}` JSON. An image, when present, is
/// sent in a second request to the same URL with `?part=image` as
/// `application/octet-stream`.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: reqwest::Url,
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    text: &'a str,
}

impl WebhookSink {
    /// Create a sink posting to `url` with a per-request timeout.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, IndexerError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| IndexerError::Notify(format!("invalid webhook URL {url}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexerError::Notify(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, url })
    }

    fn image_url(&self) -> reqwest::Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("part", "image");
        url
    }
}

impl NotificationSink for WebhookSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), IndexerError> {
        self.client
            .post(self.url.clone())
            .json(&WebhookBody {
                text: &notification.text,
            })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| IndexerError::Notify(format!("webhook text delivery failed: {e}")))?;

        if let Some(image) = &notification.image {
            self.client
                .post(self.image_url())
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(image.clone())
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| IndexerError::Notify(format!("webhook image delivery failed: {e}")))?;
        }
        Ok(())
    }
}

/// The sink chosen at startup.
#[derive(Debug, Clone)]
pub enum ConfiguredSink {
    /// See [`LogSink`].
    Log(LogSink),
    /// See [`WebhookSink`].
    Webhook(WebhookSink),
}

impl NotificationSink for ConfiguredSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), IndexerError> {
        match self {
            Self::Log(sink) => sink.deliver(notification).await,
            Self::Webhook(sink) => sink.deliver(notification).await,
        }
    }
}
