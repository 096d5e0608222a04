//! Utility modules supporting provider requests.
//!
//! - [`HttpClient`]: reqwest wrapper that classifies responses
//!   (found / unknown / rate limited / transient / permanent)
//! - [`ProviderQuota`]: per-provider next-allowed-request time
//! - [`RetryConfig`], [`RequestPolicy`] and [`with_retry`]: bounded exponential
//!   backoff under a provider quota, with cooperative cancellation
//! - [`normalize_doi`], [`validate_journal_id`]: identifier validation
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use who_cited::utils::{with_retry, RequestPolicy};
//!
//! # async fn fetch_data() -> Result<String, who_cited::sources::SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RequestPolicy::unlimited();
//! let data = with_retry("example", &policy, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod quota;
mod retry;
mod validate;

pub use http::{default_user_agent, HttpClient};
pub use quota::ProviderQuota;
pub use retry::{with_retry, RequestPolicy, RetryConfig, TransientError};
pub use validate::{is_journal_id, normalize_doi, validate_journal_id, ValidationError};
