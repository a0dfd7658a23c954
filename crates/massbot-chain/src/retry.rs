//! Bounded timeouts and retries for ledger reads.
//!
//! [`RetryingReader`] wraps any [`ChainReader`] so that every call is
//! capped by [`RetryPolicy::call_timeout`] and transient failures
//! ([`ChainError::Unavailable`], including timeouts) are retried with
//! exponential backoff. [`ChainError::NotFound`] and
//! [`ChainError::Decode`] are returned immediately.

use std::future::Future;
use std::time::Duration;

use alloy_primitives::Address;
use massbot_types::{Mass, Tier, TokenId};
use tokio::time::{sleep, timeout};

use crate::error::ChainError;
use crate::reader::{ChainReader, TokenValue};

/// Default number of attempts per call.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default per-attempt timeout in milliseconds.
const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;

/// Default backoff before the second attempt in milliseconds.
const DEFAULT_BASE_BACKOFF_MS: u64 = 250;

/// How ledger calls are bounded and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first. At least 1.
    pub max_attempts: u32,
    /// Deadline for a single attempt.
    pub call_timeout: Duration,
    /// Backoff before the second attempt; doubled for each further one.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            call_timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            base_backoff: Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Backoff to wait after the given failed attempt (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor)
    }

    /// Run `op` under this policy.
    ///
    /// `what` names the operation in logs and timeout errors.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1_u32;
        loop {
            let result = match timeout(self.call_timeout, op()).await {
                Ok(result) => result,
                Err(_elapsed) => Err(ChainError::Unavailable(format!(
                    "{what} timed out after {}ms",
                    self.call_timeout.as_millis()
                ))),
            };

            match result {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let backoff = self.backoff_after(attempt);
                    tracing::debug!(
                        what,
                        attempt,
                        backoff_ms = backoff.as_millis(),
                        error = %e,
                        "retrying ledger call"
                    );
                    sleep(backoff).await;
                    attempt = attempt.saturating_add(1);
                }
                other => return other,
            }
        }
    }
}

/// A [`ChainReader`] that applies a [`RetryPolicy`] to another reader.
#[derive(Debug, Clone)]
pub struct RetryingReader<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R: ChainReader> RetryingReader<R> {
    /// Wrap `inner` with `policy`.
    pub const fn new(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped reader.
    pub const fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: ChainReader> ChainReader for RetryingReader<R> {
    async fn value_of(&self, id: TokenId) -> Result<TokenValue, ChainError> {
        self.policy.run("value_of", || self.inner.value_of(id)).await
    }

    async fn decode(&self, value: TokenValue) -> Result<(Tier, Mass), ChainError> {
        self.policy.run("decode", || self.inner.decode(value)).await
    }

    async fn owner_of(&self, id: TokenId) -> Result<Address, ChainError> {
        self.policy.run("owner_of", || self.inner.owner_of(id)).await
    }

    async fn resolve_alias(&self, address: Address) -> Option<String> {
        timeout(self.policy.call_timeout, self.inner.resolve_alias(address))
            .await
            .ok()
            .flatten()
    }

    async fn universe_size(&self) -> Result<u64, ChainError> {
        self.policy.run("universe_size", || self.inner.universe_size()).await
    }

    async fn current_alpha(&self) -> Result<TokenId, ChainError> {
        self.policy.run("current_alpha", || self.inner.current_alpha()).await
    }
}
