//! Mock source for testing purposes.

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::models::{CitingRecord, Doi, JournalId, Metadata, ProviderKind};
use crate::sources::{CiterStream, ListingPage, Source, SourceCapabilities, SourceError};

/// A mock source for testing that returns predefined responses.
///
/// Citers are keyed by target DOI; unknown targets yield nothing. Records are
/// re-stamped with this source's [`ProviderKind`] when yielded. A target
/// marked with [`MockSource::fail_for`] yields its configured records and then
/// fails with `ProviderUnavailable`.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    kind: ProviderKind,
    capabilities: SourceCapabilities,
    citers: HashMap<String, Vec<CitingRecord>>,
    failing_targets: Vec<String>,
    cancel_on: HashMap<String, CancellationToken>,
    listing: Vec<Vec<Doi>>,
    listing_fails: bool,
    metadata: HashMap<String, Metadata>,
    failing_metadata: Vec<String>,
    latency: Option<Duration>,
    citer_calls: AtomicUsize,
    listing_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
}

impl MockSource {
    /// Create a citation-only mock source.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: ProviderKind::Other(id.to_string()),
            capabilities: SourceCapabilities::CITERS,
            citers: HashMap::new(),
            failing_targets: Vec::new(),
            cancel_on: HashMap::new(),
            listing: Vec::new(),
            listing_fails: false,
            metadata: HashMap::new(),
            failing_metadata: Vec::new(),
            latency: None,
            citer_calls: AtomicUsize::new(0),
            listing_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the citing works reported for `target`.
    pub fn with_citers(
        mut self,
        target: &str,
        records: impl IntoIterator<Item = CitingRecord>,
    ) -> Self {
        self.citers
            .entry(key(target))
            .or_default()
            .extend(records);
        self
    }

    /// Make `target` fail after yielding its configured citers.
    pub fn fail_for(mut self, target: &str) -> Self {
        self.failing_targets.push(key(target));
        self
    }

    /// Cancel `token` when citers for `target` are requested.
    pub fn cancel_on(mut self, target: &str, token: CancellationToken) -> Self {
        self.cancel_on.insert(key(target), token);
        self
    }

    /// Append one page to the journal listing.
    pub fn with_listing_page<'a>(mut self, dois: impl IntoIterator<Item = &'a str>) -> Self {
        self.listing
            .push(dois.into_iter().filter_map(|d| Doi::parse(d).ok()).collect());
        self
    }

    /// Make the journal listing fail.
    pub fn fail_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    pub fn with_metadata(mut self, doi: &str, metadata: Metadata) -> Self {
        self.metadata.insert(key(doi), metadata);
        self
    }

    pub fn fail_metadata(mut self, doi: &str) -> Self {
        self.failing_metadata.push(key(doi));
        self
    }

    /// Sleep this long before each yielded citer and each metadata lookup.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn citer_calls(&self) -> usize {
        self.citer_calls.load(Ordering::SeqCst)
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    fn unavailable(&self, reason: &str) -> SourceError {
        SourceError::ProviderUnavailable {
            provider: self.id.clone(),
            attempts: 1,
            reason: reason.to_string(),
        }
    }
}

fn key(doi: &str) -> String {
    Doi::parse(doi)
        .map(String::from)
        .unwrap_or_else(|_| doi.to_lowercase())
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    fn kind(&self) -> ProviderKind {
        self.kind.clone()
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    fn fetch_citers<'a>(&'a self, target: &'a Doi) -> CiterStream<'a> {
        self.citer_calls.fetch_add(1, Ordering::SeqCst);

        if !self.supports_citers() {
            return Box::pin(stream::once(async { Err(SourceError::NotImplemented) }));
        }
        if let Some(token) = self.cancel_on.get(target.as_str()) {
            token.cancel();
        }

        let mut items: Vec<Result<CitingRecord, SourceError>> = self
            .citers
            .get(target.as_str())
            .into_iter()
            .flatten()
            .map(|record| {
                let mut record = record.clone();
                record.source_provider = self.kind.clone();
                Ok(record)
            })
            .collect();
        if self.failing_targets.iter().any(|t| t == target.as_str()) {
            items.push(Err(self.unavailable("mock failure")));
        }

        match self.latency {
            Some(latency) => Box::pin(stream::iter(items).then(move |item| async move {
                tokio::time::sleep(latency).await;
                item
            })),
            None => Box::pin(stream::iter(items)),
        }
    }

    async fn fetch_listing_page(
        &self,
        _journal: &JournalId,
        cursor: Option<&str>,
    ) -> Result<ListingPage, SourceError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);

        if !self.supports_journal_listing() {
            return Err(SourceError::NotImplemented);
        }
        if self.listing_fails {
            return Err(self.unavailable("mock listing failure"));
        }

        let index = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| SourceError::Api(format!("bad cursor {}", cursor)))?,
            None => 0,
        };
        let dois = self.listing.get(index).cloned().unwrap_or_default();
        let next_cursor = (index + 1 < self.listing.len()).then(|| (index + 1).to_string());

        Ok(ListingPage { dois, next_cursor })
    }

    async fn lookup_metadata(&self, doi: &Doi) -> Result<Option<Metadata>, SourceError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if !self.supports_metadata() {
            return Err(SourceError::NotImplemented);
        }
        if self.failing_metadata.iter().any(|d| d == doi.as_str()) {
            return Err(self.unavailable("mock metadata failure"));
        }

        Ok(self.metadata.get(doi.as_str()).cloned())
    }
}

/// Helper function to create a mock citing record for testing.
pub fn make_citer(doi: &str, title: Option<&str>, year: Option<i32>) -> CitingRecord {
    let doi = Doi::parse(doi).unwrap_or_else(|e| panic!("invalid test DOI {}: {}", doi, e));
    let mut record = CitingRecord::new(doi, ProviderKind::Other("mock".to_string()));
    if let Some(title) = title {
        record = record.title(title);
    }
    if let Some(year) = year {
        record = record.year(year);
    }
    record
}
