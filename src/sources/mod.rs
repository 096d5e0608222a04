//! Citation-data provider plugins with a capability-flagged trait.
//!
//! This module defines the [`Source`] trait that all providers implement.
//! A provider advertises what it can do through [`SourceCapabilities`]:
//!
//! - `CITERS` - list the works citing a DOI ([`Source::fetch_citers`])
//! - `JOURNAL_LISTING` - list the DOIs published in a journal
//!   ([`Source::fetch_listing_page`])
//! - `METADATA` - resolve a bare DOI to title/authors/year
//!   ([`Source::lookup_metadata`])
//!
//! Built-in providers:
//!
//! - `openalex` - OpenAlex (`CITERS`)
//! - `opencitations` - OpenCitations COCI (`CITERS`)
//! - `crossref` - Crossref REST API and depositor reports
//!   (`METADATA | JOURNAL_LISTING`)
//!
//! Providers are registered in a [`SourceRegistry`]; registration order is
//! query order, which in turn decides which provider's value wins when two
//! report the same field.

mod crossref;
mod openalex;
mod opencitations;
mod registry;

pub mod mock;

pub use crossref::CrossRefSource;
pub use mock::MockSource;
pub use openalex::OpenAlexSource;
pub use opencitations::OpenCitationsSource;
pub use registry::{SourceCapabilities, SourceRegistry};

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::models::{CitingRecord, Doi, JournalId, Metadata, ProviderKind};

/// Lazy, finite sequence of citing works for one target
pub type CiterStream<'a> = BoxStream<'a, Result<CitingRecord, SourceError>>;

/// One page of a journal's article listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub dois: Vec<Doi>,

    /// Cursor for the following page; `None` when the listing is exhausted
    pub next_cursor: Option<String>,
}

impl ListingPage {
    /// A final page
    pub fn last(dois: Vec<Doi>) -> Self {
        Self {
            dois,
            next_cursor: None,
        }
    }
}

/// The Source trait defines the interface for all provider plugins.
///
/// # Implementing a New Source
///
/// 1. Create a struct that implements `Source`
/// 2. Implement `id`, `name`, `kind` and `capabilities`
/// 3. Implement the methods matching the advertised capabilities
/// 4. Register it with a [`SourceRegistry`]
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (used in configuration, e.g. "openalex")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Provider tag stamped on records this source produces
    fn kind(&self) -> ProviderKind;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities;

    /// Whether this source can list citing works
    fn supports_citers(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::CITERS)
    }

    /// Whether this source can list a journal's articles
    fn supports_journal_listing(&self) -> bool {
        self.capabilities()
            .contains(SourceCapabilities::JOURNAL_LISTING)
    }

    /// Whether this source can resolve DOI metadata
    fn supports_metadata(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::METADATA)
    }

    /// Stream the works citing `target`.
    ///
    /// Each call starts a fresh walk over the provider's pages. A target
    /// unknown to the provider yields an empty stream rather than an error.
    fn fetch_citers<'a>(&'a self, _target: &'a Doi) -> CiterStream<'a> {
        Box::pin(futures_util::stream::once(async {
            Err(SourceError::NotImplemented)
        }))
    }

    /// Fetch one page of a journal's article listing
    async fn fetch_listing_page(
        &self,
        _journal: &JournalId,
        _cursor: Option<&str>,
    ) -> Result<ListingPage, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Look up bibliographic metadata; `Ok(None)` when the DOI is unknown
    async fn lookup_metadata(&self, _doi: &Doi) -> Result<Option<Metadata>, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Malformed DOI or journal identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Provider answered with a 5xx status
    #[error("Server error: HTTP {0}")]
    Server(u16),

    /// Rate limit exceeded (with optional retry-after seconds)
    #[error("Rate limit exceeded")]
    RateLimit(Option<u64>),

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Permanent API error from the source
    #[error("API error: {0}")]
    Api(String),

    /// Retries against one provider were exhausted
    #[error("{provider} unavailable after {attempts} attempts: {reason}")]
    ProviderUnavailable {
        provider: String,
        attempts: u32,
        reason: String,
    },

    /// No metadata could be resolved for a DOI
    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),

    /// Stop was requested
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

/// Percent-encode a DOI for use in a URL path, keeping its `/` separators
pub(crate) fn encode_doi_path(doi: &Doi) -> String {
    urlencoding::encode(doi.as_str()).replace("%2F", "/")
}
