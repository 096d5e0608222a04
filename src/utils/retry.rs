//! Retry utilities with exponential backoff for resilient API calls.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::ProviderQuota;
use crate::config::RetrySettings;
use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Set the attempt budget
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the base delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retrying after the `failures`-th consecutive failure.
    ///
    /// `initial_delay * multiplier^(failures - 1)`, raised to the server's
    /// `Retry-After` hint when larger, and capped at `max_delay`.
    pub fn delay_for(&self, failures: u32, hint: Option<Duration>) -> Duration {
        let exponent = failures.saturating_sub(1) as f64;
        let exp_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powf(exponent);
        let capped = exp_delay.min(self.max_delay.as_secs_f64());
        let delay = Duration::from_secs_f64(capped.max(0.0));
        match hint {
            Some(hint) => delay.max(hint).min(self.max_delay),
            None => delay,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier: settings.backoff_multiplier,
        }
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, PartialEq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded (with optional retry-after seconds)
    RateLimit(Option<u64>),
    /// Server error (5xx)
    ServerError(u16),
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Check if a SourceError represents a transient error
    pub fn from_source_error(err: &SourceError) -> Option<Self> {
        match err {
            SourceError::RateLimit(after) => Some(TransientError::RateLimit(*after)),
            SourceError::Network(_) => Some(TransientError::Network),
            SourceError::Timeout => Some(TransientError::Timeout),
            SourceError::Server(status) => Some(TransientError::ServerError(*status)),
            _ => None,
        }
    }

    /// The server's own hint for how long to wait, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransientError::RateLimit(Some(seconds)) => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }
}

/// Everything a provider client needs to pace and retry its requests.
///
/// Owned by one client instance; never shared between providers.
#[derive(Debug)]
pub struct RequestPolicy {
    pub retry: RetryConfig,
    pub quota: ProviderQuota,
    pub cancel: CancellationToken,
}

impl RequestPolicy {
    pub fn new(retry: RetryConfig, min_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            retry,
            quota: ProviderQuota::new(min_interval),
            cancel,
        }
    }

    /// No pacing, default retries, never cancelled
    pub fn unlimited() -> Self {
        Self {
            retry: RetryConfig::default(),
            quota: ProviderQuota::unlimited(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Execute an async operation under a provider's quota and retry budget
///
/// Before every attempt the provider quota is consulted (and waited on).
/// Transient failures push the quota out by the backoff delay and retry;
/// once the attempt budget is spent the call fails with
/// `ProviderUnavailable`. Permanent errors return immediately. Cancellation
/// is observed before each attempt and while waiting.
pub async fn with_retry<T, F, Fut>(
    provider: &str,
    policy: &RequestPolicy,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let mut attempts = 0;

    loop {
        if policy.cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }

        attempts += 1;
        policy.quota.acquire(&policy.cancel).await?;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::info!(
                        provider,
                        "Request succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                let Some(transient) = TransientError::from_source_error(&error) else {
                    return Err(error);
                };

                if attempts >= policy.retry.max_attempts {
                    tracing::warn!(
                        provider,
                        "Request failed after {} attempts: {}",
                        attempts,
                        error
                    );
                    return Err(SourceError::ProviderUnavailable {
                        provider: provider.to_string(),
                        attempts,
                        reason: error.to_string(),
                    });
                }

                let delay = policy.retry.delay_for(attempts, transient.retry_after());
                tracing::debug!(
                    provider,
                    "Transient error on attempt {}: {:?}, retrying in {:?}",
                    attempts,
                    transient,
                    delay
                );
                policy.quota.defer(delay).await;
            }
        }
    }
}
