//! Per-provider request pacing.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::sources::SourceError;

/// Tracks when a provider may next be called.
///
/// Each provider client owns exactly one quota. Callers that share a client
/// queue on the internal lock, so concurrent targets never exceed the
/// provider's pace.
#[derive(Debug)]
pub struct ProviderQuota {
    min_interval: Duration,
    next_allowed: Mutex<Instant>,
}

impl ProviderQuota {
    /// Create a quota allowing one request per `min_interval`
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(Instant::now()),
        }
    }

    /// A quota that never delays
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request is allowed, then reserve the slot.
    ///
    /// Suspends (never spins) while the next allowed time is in the future.
    /// Returns `Cancelled` if the token fires while waiting.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), SourceError> {
        let mut next_allowed = self.next_allowed.lock().await;

        if *next_allowed > Instant::now() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(SourceError::Cancelled),
                _ = sleep_until(*next_allowed) => {}
            }
        }

        *next_allowed = Instant::now() + self.min_interval;
        Ok(())
    }

    /// Push the next allowed time out by at least `delay` from now.
    pub async fn defer(&self, delay: Duration) {
        let mut next_allowed = self.next_allowed.lock().await;
        let candidate = Instant::now() + delay;
        if candidate > *next_allowed {
            *next_allowed = candidate;
        }
    }

    /// Time remaining until the next request is allowed
    pub async fn remaining(&self) -> Duration {
        let next_allowed = self.next_allowed.lock().await;
        next_allowed.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_spaces_requests() {
        let quota = ProviderQuota::new(Duration::from_millis(40));
        let cancel = CancellationToken::new();

        let start = Instant::now();
        quota.acquire(&cancel).await.unwrap();
        quota.acquire(&cancel).await.unwrap();
        quota.acquire(&cancel).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_defer_only_extends() {
        let quota = ProviderQuota::new(Duration::from_millis(10));
        quota.defer(Duration::from_secs(5)).await;
        assert!(quota.remaining().await > Duration::from_secs(4));

        quota.defer(Duration::from_millis(1)).await;
        assert!(quota.remaining().await > Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_acquire_observes_cancellation() {
        let quota = ProviderQuota::unlimited();
        quota.defer(Duration::from_secs(60)).await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = quota.acquire(&cancel).await;
        assert!(matches!(result, Err(SourceError::Cancelled)));
    }
}
