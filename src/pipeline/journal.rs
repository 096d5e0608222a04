//! Journal identifier to article DOIs.

use std::collections::HashSet;
use std::sync::Arc;

use async_stream::try_stream;
use futures_util::stream::BoxStream;
use futures_util::{Stream, TryStreamExt};

use crate::models::{Doi, JournalId};
use crate::sources::{Source, SourceError, SourceRegistry};

/// Walks a journal's article listing page by page
///
/// Each DOI is yielded once, in listing order. The walk stops when the
/// listing has no next page, or when a cursor repeats.
#[derive(Debug, Clone)]
pub struct JournalResolver {
    source: Arc<dyn Source>,
}

impl JournalResolver {
    pub fn new(source: Arc<dyn Source>) -> Self {
        Self { source }
    }

    /// Use the registry's listing-capable source, if it has one
    pub fn from_registry(registry: &SourceRegistry) -> Option<Self> {
        registry.listing_source().map(Self::new)
    }

    /// Lazily list the DOIs published in `journal`
    ///
    /// A failed page ends the stream with that error; callers must not act on
    /// a partial listing.
    pub fn resolve<'a>(&'a self, journal: &'a JournalId) -> BoxStream<'a, Result<Doi, SourceError>> {
        Box::pin(self.listing(journal))
    }

    /// Collect the whole listing, failing if any page fails
    pub async fn resolve_all(&self, journal: &JournalId) -> Result<Vec<Doi>, SourceError> {
        self.resolve(journal).try_collect().await
    }

    fn listing<'a>(
        &'a self,
        journal: &'a JournalId,
    ) -> impl Stream<Item = Result<Doi, SourceError>> + Send + 'a {
        try_stream! {
            let mut seen = HashSet::new();
            let mut visited_cursors = HashSet::new();
            let mut cursor: Option<String> = None;
            let mut pages = 0usize;

            loop {
                let page = self
                    .source
                    .fetch_listing_page(journal, cursor.as_deref())
                    .await?;
                pages += 1;

                for doi in page.dois {
                    if seen.insert(doi.clone()) {
                        yield doi;
                    }
                }

                match page.next_cursor {
                    Some(next) if visited_cursors.insert(next.clone()) => cursor = Some(next),
                    Some(next) => {
                        tracing::warn!(journal = %journal, cursor = %next, "Listing cursor repeated, stopping");
                        break;
                    }
                    None => break,
                }
            }

            tracing::debug!(journal = %journal, pages, articles = seen.len(), "Journal listing resolved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MockSource, SourceCapabilities};

    fn journal() -> JournalId {
        JournalId::parse("J297249").unwrap()
    }

    #[tokio::test]
    async fn test_resolve_dedups_across_pages() {
        let source = MockSource::new("listing")
            .with_capabilities(SourceCapabilities::JOURNAL_LISTING)
            .with_listing_page(["10.3/P1", "10.3/p2"])
            .with_listing_page(["10.3/p2", "10.3/p3"]);
        let resolver = JournalResolver::new(Arc::new(source));

        let dois = resolver.resolve_all(&journal()).await.unwrap();
        let dois: Vec<&str> = dois.iter().map(Doi::as_str).collect();
        assert_eq!(dois, vec!["10.3/p1", "10.3/p2", "10.3/p3"]);
    }

    #[tokio::test]
    async fn test_resolve_propagates_failure() {
        let source = MockSource::new("listing")
            .with_capabilities(SourceCapabilities::JOURNAL_LISTING)
            .fail_listing();
        let resolver = JournalResolver::new(Arc::new(source));

        assert!(matches!(
            resolver.resolve_all(&journal()).await,
            Err(SourceError::ProviderUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let source = MockSource::new("listing")
            .with_capabilities(SourceCapabilities::JOURNAL_LISTING);
        let resolver = JournalResolver::new(Arc::new(source));

        assert!(resolver.resolve_all(&journal()).await.unwrap().is_empty());
    }
}
